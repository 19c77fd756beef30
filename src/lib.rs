//! DotDotDot, a forgetful companion
//!
//! A supportive chat companion whose memory drains over a few seconds. Once
//! it is gone the companion greets you like a stranger, then snaps back to
//! full strength a moment later.
//!
//! # Architecture
//!
//! - **Core**: pure conversation and memory state, canned reply selection
//! - **Orchestrator**: submit/reply state machine owning every timer
//! - **Seams**: injectable clock, scheduler and random source for
//!   deterministic tests
//! - **Server**: Axum page, JSON state, submit endpoint and SSE event stream
//!
//! # Modules
//!
//! - [`memory`]: decaying memory strength
//! - [`responder`]: reply selection and response tables
//! - [`conversation`]: message log, input and phase
//! - [`companion`]: orchestrator
//! - [`events`]: event model streamed to the page
//! - [`clock`], [`scheduler`]: time and timer abstractions

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod clock;
pub mod companion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod memory;
pub mod page;
pub mod responder;
pub mod scheduler;
pub mod server;

use companion::Companion;

pub use error::{Error, Result};

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The one companion this server hosts.
    pub companion: Companion,
}
