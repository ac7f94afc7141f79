//! Immutable per-run session configuration.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::commands::DEFAULT_TRACE_COUNT;
use crate::error::ConfigError;
use crate::filter::FilterSpec;

/// Everything the controller needs to run one session.
///
/// Built once through [`SessionConfig::builder`] and never mutated. The
/// password is held as a [`SecretString`] and is redacted from `Debug`.
#[derive(Debug)]
pub struct SessionConfig {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    filter: FilterSpec,
    poll_interval: Duration,
    trace_count: u32,
}

impl SessionConfig {
    /// Start building a configuration for `host`.
    pub fn builder(host: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expose the password to the transport.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// How often the tracing loop polls the transport.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Packet budget passed to `flow trace start`.
    pub fn trace_count(&self) -> u32 {
        self.trace_count
    }
}

/// Builder for [`SessionConfig`].
///
/// # Example
///
/// ```rust
/// use fortiflow::{FilterKind, FilterSpec, SessionConfig};
///
/// let filter = FilterSpec::build(FilterKind::AddrAny, "10.0.0.1", None).unwrap();
/// let config = SessionConfig::builder("192.168.1.99")
///     .password("secret")
///     .filter(filter)
///     .build()
///     .unwrap();
/// assert_eq!(config.username(), "admin");
/// ```
pub struct SessionConfigBuilder {
    host: String,
    port: u16,
    username: String,
    password: Option<SecretString>,
    filter: Option<FilterSpec>,
    poll_interval: Duration,
    trace_count: u32,
}

impl SessionConfigBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: "admin".to_string(),
            password: None,
            filter: None,
            poll_interval: Duration::from_millis(100),
            trace_count: DEFAULT_TRACE_COUNT,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username. An empty name keeps the default (`admin`).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        if !username.is_empty() {
            self.username = username;
        }
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the tracing poll interval (default: 100ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the trace packet budget (default: 1000). Must be non-zero.
    pub fn trace_count(mut self, count: u32) -> Self {
        self.trace_count = count;
        self
    }

    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let password = self
            .password
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or(ConfigError::MissingPassword)?;

        let filter = self.filter.ok_or(ConfigError::MissingFilter)?;

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.trace_count == 0 {
            return Err(ConfigError::ZeroTraceCount);
        }

        Ok(SessionConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            password,
            filter,
            poll_interval: self.poll_interval,
            trace_count: self.trace_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;

    fn filter() -> FilterSpec {
        FilterSpec::build(FilterKind::PortAny, "443", None).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::builder("10.0.0.254")
            .password("pw")
            .filter(filter())
            .build()
            .unwrap();

        assert_eq!(config.host(), "10.0.0.254");
        assert_eq!(config.port(), 22);
        assert_eq!(config.username(), "admin");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.trace_count(), 1000);
    }

    #[test]
    fn test_blank_username_keeps_default() {
        let config = SessionConfig::builder("fw")
            .username("")
            .password("pw")
            .filter(filter())
            .build()
            .unwrap();
        assert_eq!(config.username(), "admin");
    }

    #[test]
    fn test_password_required() {
        let err = SessionConfig::builder("fw")
            .filter(filter())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingPassword);

        let err = SessionConfig::builder("fw")
            .password("")
            .filter(filter())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingPassword);
    }

    #[test]
    fn test_empty_host_rejected() {
        let err = SessionConfig::builder("  ")
            .password("pw")
            .filter(filter())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyHost);
    }

    #[test]
    fn test_zero_trace_count_rejected() {
        let err = SessionConfig::builder("fw")
            .password("pw")
            .filter(filter())
            .trace_count(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroTraceCount);
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let config = SessionConfig::builder("fw")
            .password("hunter2")
            .filter(filter())
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert_eq!(config.password(), "hunter2");
    }
}
