//! Field extraction from flow-trace lines.
//!
//! Every pattern used against device output lives here. A non-matching
//! line is ordinary input, so all extractors return `Option`.
//!
//! ```text
//! 2024-03-01 10:15:02 id=20085 trace_id=12 func=print_pkt_detail line=5895 msg="vd-root:0 received a packet(proto=6, 10.0.0.5:51514->93.184.216.34:443) tun_id=0.0.0.0 from port2. flag [S], seq 11, ack 0, win 64240"
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};

use memchr::memmem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static TRACE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"trace_id=(\d+)\s").expect("trace id pattern is valid"));

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2})").expect("timestamp pattern is valid")
});

static ENDPOINTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"proto=\d+,\s(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})[^\d]+?(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})",
    )
    .expect("endpoint pattern is valid")
});

/// Source and destination of a traced packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowEndpoints {
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
}

/// The trace id on `line`, if any.
pub fn trace_id(line: &str) -> Option<&str> {
    // Most non-trace noise (prompts, banners) has no marker at all
    memmem::find(line.as_bytes(), b"trace_id=")?;
    TRACE_ID
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The `YYYY-MM-DD HH:MM:SS` stamp at the start of `line`, if any.
pub fn timestamp(line: &str) -> Option<&str> {
    TIMESTAMP
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The `proto=N, src:port->dst:port` pair, if present and well-formed.
pub fn endpoints(line: &str) -> Option<FlowEndpoints> {
    let caps = ENDPOINTS.captures(line)?;
    let addr = |ip: usize, port: usize| -> Option<SocketAddrV4> {
        let ip: Ipv4Addr = caps.get(ip)?.as_str().parse().ok()?;
        let port: u16 = caps.get(port)?.as_str().parse().ok()?;
        Some(SocketAddrV4::new(ip, port))
    };

    Some(FlowEndpoints {
        source: addr(1, 2)?,
        destination: addr(3, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "2024-03-01 10:15:02 id=20085 trace_id=12 func=print_pkt_detail line=5895 msg=\"vd-root:0 received a packet(proto=6, 10.0.0.5:51514->93.184.216.34:443) tun_id=0.0.0.0 from port2.\"";

    #[test]
    fn test_trace_id() {
        assert_eq!(trace_id(LINE), Some("12"));
        assert_eq!(trace_id("id=1 trace_id=7 func=x"), Some("7"));
    }

    #[test]
    fn test_trace_id_requires_trailing_whitespace() {
        assert_eq!(trace_id("id=1 trace_id=7"), None);
        assert_eq!(trace_id("FGT60F # "), None);
        assert_eq!(trace_id("trace_id= 7 "), None);
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(timestamp(LINE), Some("2024-03-01 10:15:02"));
        assert_eq!(timestamp("id=1 2024-03-01 10:15:02"), None);
    }

    #[test]
    fn test_endpoints() {
        let ep = endpoints(LINE).unwrap();
        assert_eq!(ep.source, "10.0.0.5:51514".parse().unwrap());
        assert_eq!(ep.destination, "93.184.216.34:443".parse().unwrap());
    }

    #[test]
    fn test_endpoints_with_spaced_arrow() {
        let ep = endpoints("x(proto=17, 10.1.1.1:53 -> 10.2.2.2:5353) y").unwrap();
        assert_eq!(ep.destination, "10.2.2.2:5353".parse().unwrap());
    }

    #[test]
    fn test_endpoints_out_of_range_rejected() {
        assert_eq!(endpoints("(proto=6, 10.0.0.300:1->10.0.0.1:2)"), None);
        assert_eq!(endpoints("(proto=6, 10.0.0.3:99999->10.0.0.1:2)"), None);
        assert_eq!(endpoints("func=resolve_ip_tuple_fast msg=\"Find an existing session\""), None);
    }
}
