//! SSH transport options.

use std::path::PathBuf;
use std::time::Duration;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// Options for [`SshTransport`](super::SshTransport) that are not part of the
/// per-run session configuration.
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Bound on the whole connect sequence (handshake, authentication,
    /// shell and first prompt) and on waiting for a prompt after each
    /// command.
    pub timeout: Duration,

    /// Terminal width for the PTY.
    pub terminal_width: u32,

    /// Terminal height for the PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file. `None` uses `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,

    /// Regex matching the CLI prompt at the end of output.
    pub prompt_pattern: String,

    /// How many trailing bytes are searched for the prompt.
    pub search_depth: usize,
}

/// FortiOS prompts: `FGT60F #`, `FGT60F (root) #`, `FGT60F (interface) $`.
pub const FORTIOS_PROMPT: &str = r"(?m)^[\w.\-@/:]{1,63}(?: \([\w.\-]{1,63}\))? ?[#$]\s*$";

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            prompt_pattern: FORTIOS_PROMPT.to_string(),
            search_depth: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use regex::bytes::Regex;

    use super::*;

    #[test]
    fn test_fortios_prompt_match() {
        let prompt = Regex::new(FORTIOS_PROMPT).unwrap();
        assert!(prompt.is_match(b"FGT60F # "));
        assert!(prompt.is_match(b"output line\r\nFGT60F #"));
        assert!(prompt.is_match(b"FGT-HQ-01 (root) # "));
        assert!(prompt.is_match(b"fw.lab $ "));
        assert!(!prompt.is_match(b"id=20085 trace_id=1 msg=\"vd-root received a packet\""));
    }
}
