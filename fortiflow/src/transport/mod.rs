//! Remote shell transport.
//!
//! The session controller only sees the [`Transport`] / [`Session`] pair.
//! [`SshTransport`] is the production implementation over russh; tests
//! substitute scripted in-memory sessions.

pub mod config;
mod ssh;

use std::future::Future;

pub use config::{HostKeyVerification, SshOptions};
pub use ssh::{SshSession, SshTransport};

use crate::error::{ConnectError, TransportError};
use crate::session::SessionConfig;

/// Opens sessions against a device.
pub trait Transport: Send + Sync {
    /// The live session type.
    type Session: Session;

    /// Connect and authenticate with the host and credentials in `config`.
    ///
    /// On failure no half-open handle may be left behind.
    fn connect(
        &self,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<Self::Session, ConnectError>> + Send;
}

/// An authenticated interactive CLI session.
pub trait Session: Send {
    /// Send one command and return whatever the device printed before the
    /// next prompt.
    fn send_command(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Return any text received since the last call without waiting.
    /// Empty when nothing is pending.
    fn read_available(&mut self) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Release the session.
    fn close(self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
