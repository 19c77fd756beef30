//! Conversation state.
//!
//! Holds the append-only message log, the text currently in the input box and
//! whether a companion reply is pending. Transitions are plain methods that
//! report what happened; scheduling the reply is the orchestrator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Greeting the companion opens every conversation with.
pub const DEFAULT_GREETING: &str =
    "Hi there! I'm here to listen and support you. What's on your mind? 💫";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Originator {
    User,
    Companion,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub originator: Originator,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(text: impl Into<String>, originator: Originator, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            originator,
            created_at,
        }
    }
}

/// Where the conversation is in its submit/reply loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingReply,
}

/// Why a submission was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty after trimming whitespace.
    Empty,
    /// A companion reply is still pending.
    ReplyPending,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The message was appended and a reply is now pending.
    Accepted(Message),
    /// Nothing changed.
    Ignored(IgnoreReason),
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Message log plus input and phase.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    input: String,
    phase: Phase,
}

impl Conversation {
    /// Empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation opened by a companion greeting.
    #[must_use]
    pub fn with_greeting(greeting: &str, now: DateTime<Utc>) -> Self {
        let mut conversation = Self::new();
        if !greeting.trim().is_empty() {
            conversation
                .messages
                .push(Message::new(greeting, Originator::Companion, now));
        }
        conversation
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the companion typing indicator should show.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.phase == Phase::AwaitingReply
    }

    /// Replace the input box contents.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Submit the current input.
    ///
    /// On success the input is cleared, the user message is appended with its
    /// original whitespace, and the phase moves to [`Phase::AwaitingReply`].
    pub fn submit(&mut self, now: DateTime<Utc>) -> SubmitOutcome {
        if self.input.trim().is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::Empty);
        }
        if self.phase == Phase::AwaitingReply {
            return SubmitOutcome::Ignored(IgnoreReason::ReplyPending);
        }

        let text = std::mem::take(&mut self.input);
        let message = Message::new(text, Originator::User, now);
        self.messages.push(message.clone());
        self.phase = Phase::AwaitingReply;
        SubmitOutcome::Accepted(message)
    }

    /// Text of the most recent user message, if any.
    #[must_use]
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.originator == Originator::User)
            .map(|m| m.text.as_str())
    }

    /// Append the companion's reply and return to [`Phase::Idle`].
    pub fn complete_reply(&mut self, text: impl Into<String>, now: DateTime<Utc>) -> Message {
        let message = Message::new(text, Originator::Companion, now);
        self.messages.push(message.clone());
        self.phase = Phase::Idle;
        message
    }
}
