//! The session state machine.

use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use tokio::time::MissedTickBehavior;

use super::cancel::CancelToken;
use super::capture::RawCapture;
use super::commands::{clear_group, enable_group};
use super::config::SessionConfig;
use super::SessionState;
use crate::error::{ConnectError, TransportError};
use crate::transport::{Session, Transport};

/// Which command group a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandGroup {
    Clear,
    Enable,
}

/// Outcome of sending one command.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    /// The group the command was sent as part of.
    pub group: CommandGroup,

    /// The command text.
    pub command: String,

    /// Time taken to send and read back the echo.
    pub elapsed: Duration,

    /// Transport failure message, if the send failed.
    pub error: Option<String>,
}

impl CommandRecord {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Why the tracing loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEnd {
    /// The operator raised the cancel token.
    Cancelled,
    /// Reading from the transport failed.
    TransportFailed(String),
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Trace output, in arrival order.
    pub capture: RawCapture,

    /// Every command sent, in order, across all groups.
    pub commands: Vec<CommandRecord>,

    /// Why tracing ended.
    pub trace_end: TraceEnd,

    /// Set if releasing the transport failed.
    pub close_error: Option<String>,
}

impl SessionOutcome {
    /// Commands whose send failed.
    pub fn failed_commands(&self) -> impl Iterator<Item = &CommandRecord> {
        self.commands.iter().filter(|c| !c.is_success())
    }
}

/// Warns if a connected session goes away without being closed, e.g. when
/// the run future is dropped mid-flight.
struct CloseGuard {
    host: String,
    armed: bool,
}

impl CloseGuard {
    fn arm(host: &str) -> Self {
        Self {
            host: host.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                "session to {} dropped without disconnect; device may still be debugging",
                self.host
            );
        }
    }
}

type Echo = Box<dyn FnMut(&str) + Send>;

/// Drives one device through configure, trace and cleanup.
///
/// # Example
///
/// ```rust,no_run
/// use fortiflow::{CancelToken, FilterKind, FilterSpec, SessionConfig, SessionController};
/// use fortiflow::transport::{SshOptions, SshTransport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let filter = FilterSpec::build(FilterKind::AddrAny, "10.0.0.1", None)?;
/// let config = SessionConfig::builder("192.168.1.99")
///     .password("secret")
///     .filter(filter)
///     .build()?;
///
/// let transport = SshTransport::new(SshOptions::default())?;
/// let mut controller = SessionController::new(transport, config)
///     .with_echo(|chunk| print!("{}", chunk));
///
/// let cancel = CancelToken::new();
/// let stopper = cancel.clone();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     stopper.cancel();
/// });
///
/// let outcome = controller.run(&cancel).await?;
/// println!("captured {} bytes", outcome.capture.byte_len());
/// # Ok(())
/// # }
/// ```
pub struct SessionController<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    history: Vec<SessionState>,
    echo: Option<Echo>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Disconnected,
            history: Vec::new(),
            echo: None,
        }
    }

    /// Forward every captured chunk to `echo` as it arrives.
    pub fn with_echo(mut self, echo: impl FnMut(&str) + Send + 'static) -> Self {
        self.echo = Some(Box::new(echo));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn enter(&mut self, next: SessionState) {
        debug!("session: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Run the full session until `cancel` is raised or the transport fails.
    ///
    /// Only a connect failure is returned as an error; in that case nothing
    /// was sent and the controller is still `Disconnected`. Once connected,
    /// the clear group is always sent and the transport always released.
    /// Cancelling while the connect is still pending counts as a connect
    /// failure.
    pub async fn run(&mut self, cancel: &CancelToken) -> Result<SessionOutcome, ConnectError> {
        info!(
            "connecting to {}:{} as {}",
            self.config.host(),
            self.config.port(),
            self.config.username()
        );

        // A connect that is still pending when the token is raised is
        // abandoned; nothing has been sent yet.
        let connected = tokio::select! {
            biased;
            result = self.transport.connect(&self.config) => result,
            _ = cancel.cancelled() => Err(ConnectError::Unclassified {
                host: self.config.host().to_string(),
                reason: "cancelled while connecting".to_string(),
            }),
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(e) => {
                warn!("connect failed: {}", e);
                return Err(e);
            }
        };
        let mut guard = CloseGuard::arm(self.config.host());
        self.enter(SessionState::Connected);

        let mut commands = Vec::new();
        send_group(&mut session, CommandGroup::Clear, clear_group(), &mut commands).await;
        let enable = enable_group(self.config.filter(), self.config.trace_count());
        send_group(&mut session, CommandGroup::Enable, enable, &mut commands).await;
        self.enter(SessionState::DebugConfigured);

        info!("trace started");
        self.enter(SessionState::Tracing);
        let (capture, trace_end) = self.trace(&mut session, cancel).await;
        info!(
            "trace stopped ({:?}), {} chunks / {} bytes captured",
            trace_end,
            capture.len(),
            capture.byte_len()
        );

        send_group(&mut session, CommandGroup::Clear, clear_group(), &mut commands).await;
        self.enter(SessionState::DebugCleared);

        let close_error = match session.close().await {
            Ok(()) => None,
            Err(e) => {
                warn!("disconnect failed: {}", e);
                Some(e.to_string())
            }
        };
        guard.disarm();
        self.enter(SessionState::Disconnected);

        Ok(SessionOutcome {
            capture,
            commands,
            trace_end,
            close_error,
        })
    }

    /// Poll the transport until cancelled or a read fails.
    async fn trace(
        &mut self,
        session: &mut T::Session,
        cancel: &CancelToken,
    ) -> (RawCapture, TraceEnd) {
        let mut capture = RawCapture::new();
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            if cancel.is_cancelled() {
                break TraceEnd::Cancelled;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break TraceEnd::Cancelled,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.pull(session, &mut capture).await {
                warn!("trace read failed: {}", e);
                break TraceEnd::TransportFailed(e.to_string());
            }
        };

        // Pick up whatever arrived since the last tick
        if end == TraceEnd::Cancelled {
            if let Err(e) = self.pull(session, &mut capture).await {
                debug!("final trace read failed: {}", e);
            }
        }

        (capture, end)
    }

    /// Read pending output once, keeping and echoing it if significant.
    async fn pull(
        &mut self,
        session: &mut T::Session,
        capture: &mut RawCapture,
    ) -> Result<(), TransportError> {
        let chunk = session.read_available().await?;
        if RawCapture::is_significant(&chunk) {
            trace!("trace chunk: {} bytes", chunk.len());
            if let Some(echo) = self.echo.as_mut() {
                echo(&chunk);
            }
            capture.push(chunk);
        }
        Ok(())
    }
}

/// Send every command in order. Failures are logged and recorded, never
/// propagated, and do not stop the rest of the group.
async fn send_group<S: Session>(
    session: &mut S,
    group: CommandGroup,
    commands: Vec<String>,
    records: &mut Vec<CommandRecord>,
) {
    for command in commands {
        let start = Instant::now();
        let result = session.send_command(&command).await;
        let elapsed = start.elapsed();

        let error = match result {
            Ok(echo) => {
                debug!("->#{} ({:?})", command, elapsed);
                if !echo.is_empty() {
                    debug!("{}", echo);
                }
                None
            }
            Err(e) => {
                warn!("->#{} failed: {}", command, e);
                Some(e.to_string())
            }
        };

        records.push(CommandRecord {
            group,
            command,
            elapsed,
            error,
        });
    }
}
