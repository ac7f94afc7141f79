//! Byte-level handling of interactive shell output.

mod buffer;

pub use buffer::PatternBuffer;
