//! SSH transport implementation using russh.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, trace, warn};
use regex::bytes::Regex;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::time::{Instant, timeout_at};

use super::config::{HostKeyVerification, SshOptions};
use super::{Session, Transport};
use crate::channel::PatternBuffer;
use crate::error::{ConnectError, TransportError};
use crate::session::SessionConfig;

/// Opens password-authenticated PTY shells with russh.
pub struct SshTransport {
    options: SshOptions,
    prompt: Regex,
}

impl SshTransport {
    /// Create a transport, compiling the configured prompt pattern.
    pub fn new(options: SshOptions) -> Result<Self, regex::Error> {
        let prompt = Regex::new(&options.prompt_pattern)?;
        Ok(Self { options, prompt })
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }
}

impl Transport for SshTransport {
    type Session = SshSession;

    async fn connect(&self, config: &SessionConfig) -> Result<SshSession, ConnectError> {
        let host = config.host().to_string();
        let timeout = self.options.timeout;
        // One budget covers handshake, auth, shell and the first prompt.
        let deadline = Instant::now() + timeout;
        let expired = |host: String, stage: &str| ConnectError::Unclassified {
            host,
            reason: format!("{} timed out after {:?}", stage, timeout),
        };

        let ssh_config = Arc::new(client::Config {
            // Tracing sits idle for long stretches; rely on keepalives instead.
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: host.clone(),
            port: config.port(),
            host_key_verification: self.options.host_key_verification.clone(),
            known_hosts_path: self.options.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}:{}", host, config.port());

        let mut handle = match timeout_at(
            deadline,
            client::connect(ssh_config, (config.host(), config.port()), handler),
        )
        .await
        {
            Err(_) => return Err(expired(host, "handshake")),
            Ok(Err(e)) => {
                // A stored host key failure explains the generic UnknownKey error
                let stored = host_key_error.lock().ok().and_then(|mut slot| slot.take());
                return Err(match stored {
                    Some(reason) => ConnectError::Unclassified { host, reason },
                    None => classify(&host, e),
                });
            }
            Ok(Ok(handle)) => handle,
        };

        let auth = timeout_at(
            deadline,
            handle.authenticate_password(config.username(), config.password()),
        )
        .await;
        let authenticated = match auth {
            Err(_) => {
                abandon(&handle).await;
                return Err(expired(host, "authentication"));
            }
            Ok(Err(e)) => {
                abandon(&handle).await;
                return Err(classify(&host, e));
            }
            Ok(Ok(result)) => result.success(),
        };

        if !authenticated {
            abandon(&handle).await;
            return Err(ConnectError::AuthRejected {
                host,
                user: config.username().to_string(),
            });
        }

        let channel = match timeout_at(deadline, self.open_shell(&handle)).await {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                abandon(&handle).await;
                return Err(ConnectError::Unclassified {
                    host,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                abandon(&handle).await;
                return Err(expired(host, "shell request"));
            }
        };

        let mut session = SshSession {
            handle,
            channel,
            buffer: PatternBuffer::new(self.options.search_depth),
            prompt: self.prompt.clone(),
            timeout,
            closed: false,
        };

        // Swallow the login banner up to the first prompt
        if let Err(e) = session.read_until_prompt_by(deadline).await {
            abandon(&session.handle).await;
            return Err(ConnectError::Unclassified {
                host,
                reason: format!("no prompt after login: {}", e),
            });
        }

        debug!("session to {} ready", host);
        Ok(session)
    }
}

impl SshTransport {
    async fn open_shell(&self, handle: &Handle<SshHandler>) -> Result<Channel<Msg>, russh::Error> {
        let channel = handle.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                self.options.terminal_width,
                self.options.terminal_height,
                0,
                0,
                &[],
            )
            .await?;

        channel.request_shell(true).await?;

        Ok(channel)
    }
}

/// How long a failed setup may spend saying goodbye.
const ABANDON_GRACE: Duration = Duration::from_secs(2);

/// Best-effort disconnect of a handle that never became a session.
async fn abandon(handle: &Handle<SshHandler>) {
    let disconnect = handle.disconnect(Disconnect::ByApplication, "", "en");
    match tokio::time::timeout(ABANDON_GRACE, disconnect).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("disconnect after failed setup: {}", e),
        Err(_) => debug!("disconnect after failed setup timed out"),
    }
}

/// Map a handshake/auth failure onto the operator-facing classes.
fn classify(host: &str, err: russh::Error) -> ConnectError {
    let no_transport = match &err {
        russh::Error::IO(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::UnexpectedEof
        ),
        russh::Error::Disconnect | russh::Error::HUP => true,
        _ => false,
    };

    if no_transport {
        ConnectError::NoTransport {
            host: host.to_string(),
            reason: err.to_string(),
        }
    } else {
        ConnectError::Unclassified {
            host: host.to_string(),
            reason: err.to_string(),
        }
    }
}

/// A live PTY shell on the device.
pub struct SshSession {
    handle: Handle<SshHandler>,
    channel: Channel<Msg>,
    buffer: PatternBuffer,
    prompt: Regex,
    timeout: Duration,
    closed: bool,
}

impl SshSession {
    fn ingest(&mut self, msg: ChannelMsg) {
        match msg {
            ChannelMsg::Data { ref data } => self.buffer.extend(data),
            ChannelMsg::ExtendedData { ref data, .. } => self.buffer.extend(data),
            ChannelMsg::Eof | ChannelMsg::Close => self.closed = true,
            _ => {}
        }
    }

    /// Pull every message that is already queued, without waiting.
    fn drain_pending(&mut self) {
        loop {
            let next = match self.channel.wait().now_or_never() {
                Some(next) => next,
                None => break,
            };
            match next {
                Some(msg) => self.ingest(msg),
                None => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    /// Read until the prompt appears in the buffer tail, returning
    /// everything up to and including it.
    async fn read_until_prompt(&mut self) -> Result<String, TransportError> {
        let deadline = Instant::now() + self.timeout;
        self.read_until_prompt_by(deadline).await
    }

    async fn read_until_prompt_by(&mut self, deadline: Instant) -> Result<String, TransportError> {
        loop {
            if let Some(end) = self.buffer.search_tail(&self.prompt) {
                return Ok(self.buffer.split_to(end));
            }
            if self.closed {
                return Err(TransportError::Closed);
            }

            match timeout_at(deadline, self.channel.wait()).await {
                Err(_) => return Err(TransportError::Timeout(self.timeout)),
                Ok(None) => {
                    self.closed = true;
                    return Err(TransportError::Closed);
                }
                Ok(Some(msg)) => self.ingest(msg),
            }
        }
    }
}

impl Session for SshSession {
    async fn send_command(&mut self, command: &str) -> Result<String, TransportError> {
        self.drain_pending();
        if !self.buffer.is_empty() {
            trace!("discarding {} pending bytes before command", self.buffer.len());
            self.buffer.clear();
        }
        if self.closed {
            return Err(TransportError::Closed);
        }

        let line = format!("{}\n", command);
        self.channel.data(line.as_bytes()).await?;

        let raw = self.read_until_prompt().await?;
        Ok(normalize_output(&raw, command))
    }

    async fn read_available(&mut self) -> Result<String, TransportError> {
        self.drain_pending();
        if self.closed && self.buffer.is_empty() {
            return Err(TransportError::Closed);
        }
        Ok(self.buffer.take())
    }

    async fn close(self) -> Result<(), TransportError> {
        if let Err(e) = self.channel.close().await {
            debug!("channel close: {}", e);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// Strip the command echo and the trailing prompt line.
fn normalize_output(raw: &str, command: &str) -> String {
    let output = raw.trim_start_matches(['\r', '\n']);
    let output = output
        .strip_prefix(command)
        .unwrap_or(output)
        .trim_start_matches(['\r', '\n']);

    match output.rfind('\n') {
        Some(pos) => output[..pos].trim_end_matches('\r').to_string(),
        None => String::new(),
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed host key failure, surfaced by connect() instead of the
    /// generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<String>>>,
}

impl SshHandler {
    /// `Ok(true)` if matched, `Ok(false)` if the host is unknown.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, String> {
        let result = match self.known_hosts_path {
            Some(ref path) => {
                russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(format!(
                "host key for {}:{} changed (known_hosts line {})",
                self.host, self.port, line
            )),
            Err(e) => Err(format!("known_hosts: {}", e)),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), russh::keys::Error> {
        match self.known_hosts_path {
            Some(ref path) => russh::keys::known_hosts::learn_known_hosts_path(
                &self.host, self.port, pubkey, path,
            ),
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        }
    }

    fn reject(&self, reason: String) {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(reason);
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(reason) => {
                    self.reject(reason);
                    Ok(false)
                }
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    self.reject(format!(
                        "host {}:{} not in known_hosts",
                        self.host, self.port
                    ));
                    Ok(false)
                }
                Err(reason) => {
                    self.reject(reason);
                    Ok(false)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterKind, FilterSpec};

    #[test]
    fn test_normalize_strips_echo_and_prompt() {
        let raw = "diagnose debug enable\r\n\r\nFGT60F # ";
        assert_eq!(normalize_output(raw, "diagnose debug enable"), "");

        let raw = "diagnose debug flow filter clear\r\nsome output\r\nFGT60F # ";
        assert_eq!(
            normalize_output(raw, "diagnose debug flow filter clear"),
            "some output"
        );
    }

    #[test]
    fn test_normalize_without_echo() {
        let raw = "\r\nline a\r\nline b\r\nFGT60F (root) # ";
        assert_eq!(normalize_output(raw, "get system status"), "line a\r\nline b");
    }

    #[test]
    fn test_classify_refused_is_no_transport() {
        let err = russh::Error::IO(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(
            classify("10.0.0.1", err),
            ConnectError::NoTransport { .. }
        ));
    }

    #[test]
    fn test_classify_disconnect_is_no_transport() {
        assert!(matches!(
            classify("10.0.0.1", russh::Error::Disconnect),
            ConnectError::NoTransport { .. }
        ));
    }

    #[tokio::test]
    async fn test_connect_gives_up_on_silent_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept and hold the socket without ever speaking SSH.
        let _peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
            drop(socket);
        });

        let transport = SshTransport::new(SshOptions {
            timeout: Duration::from_millis(200),
            host_key_verification: HostKeyVerification::Disabled,
            ..Default::default()
        })
        .unwrap();
        let filter = FilterSpec::build(FilterKind::AddrAny, "10.0.0.1", None).unwrap();
        let config = SessionConfig::builder("127.0.0.1")
            .port(port)
            .password("pw")
            .filter(filter)
            .build()
            .unwrap();

        let started = Instant::now();
        let err = tokio::time::timeout(Duration::from_secs(10), transport.connect(&config))
            .await
            .expect("connect must respect its own deadline")
            .err()
            .unwrap();

        assert!(matches!(err, ConnectError::Unclassified { .. }));
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_classify_other_is_unclassified() {
        let err = russh::Error::IO(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(
            classify("10.0.0.1", err),
            ConnectError::Unclassified { .. }
        ));
    }
}
