//! Device session orchestration.
//!
//! The [`SessionController`] walks one device through
//! `Disconnected → Connected → DebugConfigured → Tracing → DebugCleared →
//! Disconnected`, capturing flow-trace output along the way.

mod cancel;
mod capture;
pub mod commands;
mod config;
mod controller;

pub use cancel::CancelToken;
pub use capture::RawCapture;
pub use config::{SessionConfig, SessionConfigBuilder};
pub use controller::{CommandGroup, CommandRecord, SessionController, SessionOutcome, TraceEnd};

use std::fmt;

/// Lifecycle state of the device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connected,
    DebugConfigured,
    Tracing,
    DebugCleared,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::DebugConfigured => "debug-configured",
            SessionState::Tracing => "tracing",
            SessionState::DebugCleared => "debug-cleared",
        };
        f.write_str(name)
    }
}
