//! Flow-trace correlation.
//!
//! The device interleaves lines from many flows. [`correlate`] regroups
//! them by trace id while keeping stream order both within a group and
//! across groups (by first appearance).

pub mod parse;

use std::fmt;
use std::net::SocketAddrV4;

use indexmap::IndexMap;
use log::{debug, trace};
use serde::Serialize;

use crate::error::{HeaderField, MalformedGroupError};
pub use parse::FlowEndpoints;

/// One trace line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    pub trace_id: String,

    /// Leading `YYYY-MM-DD HH:MM:SS`, when the device prints one.
    pub timestamp: Option<String>,

    /// Only extracted for the first record of a group.
    pub endpoints: Option<FlowEndpoints>,

    /// The line exactly as captured.
    pub raw: String,
}

impl TraceRecord {
    /// Parse a line, returning `None` if it carries no trace id.
    pub fn parse(line: &str) -> Option<Self> {
        let trace_id = parse::trace_id(line)?;
        Some(Self {
            trace_id: trace_id.to_string(),
            timestamp: parse::timestamp(line).map(str::to_string),
            endpoints: None,
            raw: line.to_string(),
        })
    }
}

/// All records of one trace id, in stream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceGroup {
    trace_id: String,
    records: Vec<TraceRecord>,
}

impl TraceGroup {
    fn start(mut first: TraceRecord) -> Self {
        first.endpoints = parse::endpoints(&first.raw);
        Self {
            trace_id: first.trace_id.clone(),
            records: vec![first],
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// The record that seeds the group header.
    pub fn first(&self) -> &TraceRecord {
        &self.records[0]
    }

    /// Raw lines in order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.raw.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Derive the display header from the first record.
    pub fn header(&self) -> Result<FlowHeader, MalformedGroupError> {
        let first = self.first();
        let missing = |missing| MalformedGroupError {
            trace_id: self.trace_id.clone(),
            missing,
        };

        let timestamp = first
            .timestamp
            .clone()
            .ok_or_else(|| missing(HeaderField::Timestamp))?;
        let endpoints = first.endpoints.ok_or_else(|| missing(HeaderField::Endpoints))?;

        Ok(FlowHeader {
            timestamp,
            source: endpoints.source,
            destination: endpoints.destination,
        })
    }
}

/// A flow's one-line summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowHeader {
    pub timestamp: String,
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
}

impl fmt::Display for FlowHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Src: {} -->> Dst: {}",
            self.timestamp, self.source, self.destination
        )
    }
}

/// Groups keyed by trace id, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceCorrelationResult {
    groups: IndexMap<String, TraceGroup>,
    skipped_lines: usize,
}

impl TraceCorrelationResult {
    pub fn groups(&self) -> impl Iterator<Item = &TraceGroup> {
        self.groups.values()
    }

    pub fn get(&self, trace_id: &str) -> Option<&TraceGroup> {
        self.groups.get(trace_id)
    }

    /// Trace ids in first-seen order.
    pub fn trace_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Lines dropped for lack of a trace id.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    fn push(&mut self, record: TraceRecord) {
        match self.groups.get_mut(&record.trace_id) {
            Some(group) => group.records.push(record),
            None => {
                let group = TraceGroup::start(record);
                self.groups.insert(group.trace_id.clone(), group);
            }
        }
    }
}

/// Group captured trace text by trace id.
///
/// Lines without a trace id are skipped and counted. Nothing is sorted,
/// merged or deduplicated.
///
/// # Example
///
/// ```rust
/// let raw = "id=1 trace_id=5 a\nid=2 trace_id=9 b\nid=3 trace_id=5 c\n";
/// let result = fortiflow::correlate(raw);
/// assert_eq!(result.trace_ids().collect::<Vec<_>>(), vec!["5", "9"]);
/// ```
pub fn correlate(raw: &str) -> TraceCorrelationResult {
    let mut result = TraceCorrelationResult::default();

    for line in raw.lines() {
        match TraceRecord::parse(line) {
            Some(record) => result.push(record),
            None => {
                trace!("skipping line without trace id: {:?}", line);
                result.skipped_lines += 1;
            }
        }
    }

    debug!(
        "correlated {} flows, {} lines skipped",
        result.len(),
        result.skipped_lines
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ts: &str, id: u32, msg: &str) -> String {
        format!(
            "{} id=20085 trace_id={} func=print_pkt_detail line=5895 msg=\"{}\"",
            ts, id, msg
        )
    }

    #[test]
    fn test_interleaved_groups_keep_order() {
        let raw = [
            "id=1 trace_id=5 first of five",
            "id=2 trace_id=9 first of nine",
            "id=3 trace_id=5 second of five",
            "garbage without an id",
        ]
        .join("\n");

        let result = correlate(&raw);

        assert_eq!(result.len(), 2);
        assert_eq!(result.trace_ids().collect::<Vec<_>>(), vec!["5", "9"]);
        assert_eq!(
            result.get("5").unwrap().lines().collect::<Vec<_>>(),
            vec!["id=1 trace_id=5 first of five", "id=3 trace_id=5 second of five"]
        );
        assert_eq!(result.get("9").unwrap().len(), 1);
        assert_eq!(result.skipped_lines(), 1);
        assert!(result.groups().all(|g| g.lines().all(|l| !l.contains("garbage"))));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let raw = "id=1 trace_id=3 a\r\n\r\nid=2 trace_id=3 b\r\n";
        let result = correlate(raw);

        assert_eq!(result.len(), 1);
        assert_eq!(
            result.get("3").unwrap().lines().collect::<Vec<_>>(),
            vec!["id=1 trace_id=3 a", "id=2 trace_id=3 b"]
        );
        assert_eq!(result.skipped_lines(), 1);
    }

    #[test]
    fn test_empty_input() {
        let result = correlate("");
        assert!(result.is_empty());
        assert_eq!(result.skipped_lines(), 0);
    }

    #[test]
    fn test_endpoints_only_on_first_record() {
        let raw = [
            line(
                "2024-03-01 10:15:02",
                1,
                "vd-root:0 received a packet(proto=6, 10.0.0.5:51514->93.184.216.34:443) from port2.",
            ),
            line(
                "2024-03-01 10:15:02",
                1,
                "vd-root:0 received a packet(proto=6, 10.0.0.5:51514->93.184.216.34:443) again",
            ),
        ]
        .join("\n");

        let result = correlate(&raw);
        let group = result.get("1").unwrap();
        assert!(group.records()[0].endpoints.is_some());
        assert!(group.records()[1].endpoints.is_none());
        assert_eq!(
            group.records()[1].timestamp.as_deref(),
            Some("2024-03-01 10:15:02")
        );
    }

    #[test]
    fn test_header_from_first_record() {
        let raw = [
            line(
                "2024-03-01 10:15:02",
                7,
                "vd-root:0 received a packet(proto=6, 10.0.0.5:51514->93.184.216.34:443) from port2.",
            ),
            line("2024-03-01 10:15:03", 7, "Find an existing session, id-0001"),
        ]
        .join("\n");

        let result = correlate(&raw);
        let header = result.get("7").unwrap().header().unwrap();
        assert_eq!(
            header.to_string(),
            "2024-03-01 10:15:02 Src: 10.0.0.5:51514 -->> Dst: 93.184.216.34:443"
        );
    }

    #[test]
    fn test_header_missing_endpoints() {
        let raw = line("2024-03-01 10:15:02", 4, "Find an existing session");
        let err = correlate(&raw).get("4").unwrap().header().unwrap_err();
        assert_eq!(err.trace_id, "4");
        assert_eq!(err.missing, HeaderField::Endpoints);
    }

    #[test]
    fn test_header_missing_timestamp() {
        let raw = "id=20085 trace_id=4 msg=\"received a packet(proto=1, 10.0.0.1:2048->10.0.0.2:0)\"";
        let err = correlate(raw).get("4").unwrap().header().unwrap_err();
        assert_eq!(err.missing, HeaderField::Timestamp);
    }
}
