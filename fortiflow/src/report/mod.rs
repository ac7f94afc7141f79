//! Flow report rendering.
//!
//! [`render`] turns a correlation result into a [`ReportDocument`]; the
//! document can then be written as HTML or JSON next to the raw capture.

pub mod artifact;
mod document;
mod html;

pub use artifact::{ArtifactPaths, ArtifactWriter, ReportFormat};
pub use document::{ReportDocument, ReportSection, SectionHeader, SessionMeta, render};
