//! Raw trace capture.

/// Append-only sequence of text chunks read while tracing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCapture {
    chunks: Vec<String>,
}

impl RawCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a polled chunk carries anything beyond line terminators.
    pub fn is_significant(chunk: &str) -> bool {
        chunk.bytes().any(|b| b != b'\r' && b != b'\n')
    }

    pub fn push(&mut self, chunk: String) {
        self.chunks.push(chunk);
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total captured bytes.
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(String::len).sum()
    }

    /// Concatenate all chunks, consuming the capture.
    pub fn into_text(self) -> String {
        self.chunks.concat()
    }
}
