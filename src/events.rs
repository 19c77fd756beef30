//! Events pushed to the rendering surface.
//!
//! Every state change the companion makes is mirrored as a
//! [`CompanionEvent`], broadcast to subscribers and serialized as a
//! Server-Sent Event.
//!
//! # Example
//!
//! ```rust
//! use dotdotdot::events::{CompanionEvent, sse_event};
//!
//! let sse = sse_event(&CompanionEvent::Typing { active: true });
//! assert!(sse.starts_with("event: typing\n"));
//! ```

use serde::{Deserialize, Serialize};

use crate::conversation::Message;
use crate::memory::MemoryReading;
use crate::responder::ReplyKind;

/// Everything the rendering surface draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionSnapshot {
    /// Messages in display order.
    pub messages: Vec<Message>,
    /// Companion typing indicator.
    pub typing: bool,
    pub memory: MemoryReading,
}

/// State changes emitted by the companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CompanionEvent {
    /// Full state, sent first on every new subscription.
    #[serde(rename = "snapshot")]
    Snapshot(CompanionSnapshot),

    /// A message was appended to the log.
    #[serde(rename = "message.appended")]
    MessageAppended {
        message: Message,
        /// Rule that picked a companion reply. Absent for user messages.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_kind: Option<ReplyKind>,
    },

    /// Typing indicator changed.
    #[serde(rename = "typing")]
    Typing { active: bool },

    /// Periodic memory strength update.
    #[serde(rename = "memory.tick")]
    MemoryTick(MemoryReading),

    /// Memory strength reached zero.
    #[serde(rename = "memory.expired")]
    MemoryExpired,

    /// Memory was restored to full strength.
    #[serde(rename = "memory.reset")]
    MemoryReset(MemoryReading),
}

impl CompanionEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            CompanionEvent::Snapshot(_) => "snapshot",
            CompanionEvent::MessageAppended { .. } => "message.appended",
            CompanionEvent::Typing { .. } => "typing",
            CompanionEvent::MemoryTick(_) => "memory.tick",
            CompanionEvent::MemoryExpired => "memory.expired",
            CompanionEvent::MemoryReset(_) => "memory.reset",
        }
    }
}

/// Format a [`CompanionEvent`] as an SSE frame with `event:` and `data:` lines.
pub fn sse_event(evt: &CompanionEvent) -> String {
    let json = serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    });

    format!("event: {}\ndata: {json}\n\n", evt.name())
}
