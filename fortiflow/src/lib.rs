//! # fortiflow
//!
//! Capture, correlate and report FortiGate flow traces over SSH.
//!
//! A run validates a [`FilterSpec`], lets a [`SessionController`] install it
//! on the device and stream `diagnose debug flow` output until cancelled,
//! then [`correlate`]s the captured lines per trace id and [`render`]s one
//! collapsible report section per flow.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fortiflow::transport::{SshOptions, SshTransport};
//! use fortiflow::{
//!     CancelToken, FilterKind, FilterSpec, SessionConfig, SessionController, SessionMeta,
//!     correlate, render,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let filter = FilterSpec::build(FilterKind::PortDst, "443", None)?;
//!     let meta = SessionMeta::new("192.168.1.99", &filter);
//!     let config = SessionConfig::builder("192.168.1.99")
//!         .username("admin")
//!         .password("secret")
//!         .filter(filter)
//!         .build()?;
//!
//!     let transport = SshTransport::new(SshOptions::default())?;
//!     let mut controller = SessionController::new(transport, config);
//!     let cancel = CancelToken::new();
//!     let outcome = controller.run(&cancel).await?;
//!
//!     let raw = outcome.capture.into_text();
//!     let report = render(&correlate(&raw), &meta);
//!     println!("{}", report.to_html());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod filter;
pub mod report;
pub mod session;
pub mod trace;
pub mod transport;

// Re-export main types for convenience
pub use error::{ConnectError, ConnectErrorKind, Error, MalformedGroupError, ValidationError};
pub use filter::{FilterKind, FilterSpec, validate_ipv4, validate_port};
pub use report::{ReportDocument, ReportFormat, SessionMeta, render};
pub use session::{CancelToken, RawCapture, SessionConfig, SessionController, SessionState};
pub use trace::{TraceCorrelationResult, TraceGroup, TraceRecord, correlate};
