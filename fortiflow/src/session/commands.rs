//! Fixed FortiOS debug command vocabulary.

use crate::filter::FilterSpec;

/// Prefix shared by every debug command.
pub const COMMAND_FAMILY: &str = "diagnose debug";

/// Clear group: returns the device to a non-debugging state.
const CLEAR: [&str; 4] = ["reset", "disable", "flow trace stop", "flow filter clear"];

/// Default number of packets the device traces before stopping on its own.
pub const DEFAULT_TRACE_COUNT: u32 = 1000;

/// Commands that tear down any debug configuration, in send order.
pub fn clear_group() -> Vec<String> {
    CLEAR
        .iter()
        .map(|cmd| format!("{} {}", COMMAND_FAMILY, cmd))
        .collect()
}

/// Commands that install `filter` and start tracing, in send order.
pub fn enable_group(filter: &FilterSpec, trace_count: u32) -> Vec<String> {
    vec![
        format!("{} console timestamp enable", COMMAND_FAMILY),
        format!("{} flow show function-name", COMMAND_FAMILY),
        filter.command(),
        format!("{} enable", COMMAND_FAMILY),
        format!("{} flow trace start {}", COMMAND_FAMILY, trace_count),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;

    #[test]
    fn test_clear_group_order() {
        assert_eq!(
            clear_group(),
            vec![
                "diagnose debug reset",
                "diagnose debug disable",
                "diagnose debug flow trace stop",
                "diagnose debug flow filter clear",
            ]
        );
    }

    #[test]
    fn test_enable_group_embeds_filter() {
        let filter = FilterSpec::build(FilterKind::AddrDst, "10.1.1.1", None).unwrap();
        assert_eq!(
            enable_group(&filter, DEFAULT_TRACE_COUNT),
            vec![
                "diagnose debug console timestamp enable",
                "diagnose debug flow show function-name",
                "diagnose debug flow filter daddr 10.1.1.1",
                "diagnose debug enable",
                "diagnose debug flow trace start 1000",
            ]
        );
    }
}
