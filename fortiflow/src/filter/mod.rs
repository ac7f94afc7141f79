//! Flow filter requests.
//!
//! A [`FilterSpec`] is the validated form of what the operator asked the
//! device to trace. It is built once, before any session is opened, and
//! rendered into the `diagnose debug flow filter` command.

mod validate;

use std::fmt;
use std::str::FromStr;

use crate::error::{FilterField, ValidationError};
use crate::session::commands::COMMAND_FAMILY;

pub use validate::{validate_ipv4, validate_port};

/// Filter selector understood by `diagnose debug flow filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// `addr` - source or destination address
    AddrAny,
    /// `saddr`
    AddrSrc,
    /// `daddr`
    AddrDst,
    /// `port` - source or destination port
    PortAny,
    /// `sport`
    PortSrc,
    /// `dport`
    PortDst,
}

impl FilterKind {
    /// All kinds in device keyword order.
    pub const ALL: [FilterKind; 6] = [
        FilterKind::AddrAny,
        FilterKind::AddrSrc,
        FilterKind::AddrDst,
        FilterKind::PortAny,
        FilterKind::PortSrc,
        FilterKind::PortDst,
    ];

    /// The device keyword for this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            FilterKind::AddrAny => "addr",
            FilterKind::AddrSrc => "saddr",
            FilterKind::AddrDst => "daddr",
            FilterKind::PortAny => "port",
            FilterKind::PortSrc => "sport",
            FilterKind::PortDst => "dport",
        }
    }

    /// Whether the options are IPv4 addresses (otherwise ports).
    pub fn is_address(self) -> bool {
        matches!(
            self,
            FilterKind::AddrAny | FilterKind::AddrSrc | FilterKind::AddrDst
        )
    }

    fn accepts(self, value: &str) -> bool {
        if self.is_address() {
            validate_ipv4(value)
        } else {
            validate_port(value)
        }
    }

    fn expected(self) -> &'static str {
        if self.is_address() {
            "expected an IPv4 address"
        } else {
            "expected a port number (0-65535)"
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for FilterKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.keyword() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = FilterKind::ALL.iter().map(|k| k.keyword()).collect();
                ValidationError::new(
                    FilterField::Kind,
                    format!("'{}' is not one of {}", s, valid.join(", ")),
                )
            })
    }
}

/// A validated flow filter.
///
/// # Example
///
/// ```rust
/// use fortiflow::{FilterKind, FilterSpec};
///
/// let spec = FilterSpec::build(FilterKind::PortDst, "80", Some("443")).unwrap();
/// assert_eq!(spec.command(), "diagnose debug flow filter dport 80 443");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    kind: FilterKind,
    option1: String,
    option2: Option<String>,
}

impl FilterSpec {
    /// Validate the options for `kind` and build the spec.
    ///
    /// `option1` is checked before `option2`. An empty `option2` counts as
    /// not supplied.
    pub fn build(
        kind: FilterKind,
        option1: &str,
        option2: Option<&str>,
    ) -> Result<Self, ValidationError> {
        if !kind.accepts(option1) {
            return Err(ValidationError::new(
                FilterField::Option1,
                format!("'{}': {}", option1, kind.expected()),
            ));
        }

        let option2 = option2.filter(|v| !v.is_empty());
        if let Some(value) = option2 {
            if !kind.accepts(value) {
                return Err(ValidationError::new(
                    FilterField::Option2,
                    format!("'{}': {}", value, kind.expected()),
                ));
            }
        }

        Ok(Self {
            kind,
            option1: option1.to_string(),
            option2: option2.map(str::to_string),
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn option1(&self) -> &str {
        &self.option1
    }

    pub fn option2(&self) -> Option<&str> {
        self.option2.as_deref()
    }

    /// The full filter command to install on the device.
    pub fn command(&self) -> String {
        match &self.option2 {
            Some(upper) => format!(
                "{} flow filter {} {} {}",
                COMMAND_FAMILY, self.kind, self.option1, upper
            ),
            None => format!("{} flow filter {} {}", COMMAND_FAMILY, self.kind, self.option1),
        }
    }
}
