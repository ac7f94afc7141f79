//! Output buffer with ANSI stripping and tail-search prompt detection.
//!
//! Only the last `search_depth` bytes are searched for the prompt, so long
//! outputs do not make every poll rescan the whole buffer.

use bytes::{Buf, BytesMut};
use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Collects printable text, dropping escape and control sequences.
#[derive(Default)]
struct Printable {
    out: Vec<u8>,
}

impl Perform for Printable {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }
}

/// Accumulates cleaned device output.
///
/// The ANSI parser keeps its state between [`extend`](Self::extend) calls,
/// so an escape sequence split across two SSH packets is still removed.
pub struct PatternBuffer {
    buffer: BytesMut,
    parser: Parser,
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a buffer that searches the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            parser: Parser::new(),
            search_depth,
        }
    }

    /// Append raw bytes, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let mut printable = Printable::default();
        self.parser.advance(&mut printable, data);
        self.buffer.extend_from_slice(&printable.out);
    }

    /// Search the tail of the buffer for `pattern`.
    ///
    /// Returns the absolute end offset of the match in the buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<usize> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern
            .find(&self.buffer[start..])
            .map(|m| start + m.end())
    }

    /// Remove and return the first `len` bytes as text.
    pub fn split_to(&mut self, len: usize) -> String {
        let head = self.buffer.split_to(len.min(self.buffer.len()));
        String::from_utf8_lossy(&head).into_owned()
    }

    /// Remove and return everything.
    pub fn take(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.advance(self.buffer.len());
        text
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}
