//! Textual validators for filter options.

use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;

/// 0-65535 as a digit pattern. Up to four digits may carry leading zeros.
static PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[0-9]{1,4}|[1-5][0-9]{4}|6[0-4][0-9]{3}|65[0-4][0-9]{2}|655[0-2][0-9]|6553[0-5])$",
    )
    .expect("port pattern is valid")
});

/// Accept dotted-quad IPv4 with every octet in 0-255.
///
/// Hostnames, IPv6 and anything with extra or missing octets are rejected.
/// No name resolution happens here.
pub fn validate_ipv4(text: &str) -> bool {
    text.parse::<Ipv4Addr>().is_ok()
}

/// Accept a decimal port number in 0-65535 with no sign.
pub fn validate_port(text: &str) -> bool {
    PORT.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_accepts() {
        assert!(validate_ipv4("192.168.1.1"));
        assert!(validate_ipv4("0.0.0.0"));
        assert!(validate_ipv4("255.255.255.255"));
    }

    #[test]
    fn test_ipv4_rejects() {
        assert!(!validate_ipv4("256.1.1.1"));
        assert!(!validate_ipv4("1.2.3"));
        assert!(!validate_ipv4(""));
        assert!(!validate_ipv4("abc"));
        assert!(!validate_ipv4("::1"));
        assert!(!validate_ipv4("fw.example.com"));
        assert!(!validate_ipv4("1.2.3.4.5"));
    }

    #[test]
    fn test_port_accepts() {
        assert!(validate_port("0"));
        assert!(validate_port("80"));
        assert!(validate_port("65535"));
        assert!(validate_port("0080"));
    }

    #[test]
    fn test_port_rejects() {
        assert!(!validate_port("65536"));
        assert!(!validate_port("-1"));
        assert!(!validate_port("+1"));
        assert!(!validate_port("port"));
        assert!(!validate_port(""));
        assert!(!validate_port("99999"));
        assert!(!validate_port(" 80"));
    }
}
