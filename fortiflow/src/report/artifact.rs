//! On-disk run artifacts.
//!
//! Each run leaves two files sharing a wall-clock stem:
//! `output-<DD-MM-YYYY_HH-MM-SS>.txt` with the raw capture and the rendered
//! report as `.html` or `.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;

use super::document::ReportDocument;
use crate::error::Result;

/// Output format of the rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Html,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
        }
    }
}

/// Where a run's artifacts were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub capture: PathBuf,
    pub report: PathBuf,
}

/// Writes the capture and report for one run.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    stem: String,
}

impl ArtifactWriter {
    /// Name artifacts after `started`.
    pub fn new(dir: impl Into<PathBuf>, started: DateTime<Local>) -> Self {
        Self {
            dir: dir.into(),
            stem: format!("output-{}", started.format("%d-%m-%Y_%H-%M-%S")),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capture_path(&self) -> PathBuf {
        self.dir.join(format!("{}.txt", self.stem))
    }

    pub fn report_path(&self, format: ReportFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, format.extension()))
    }

    /// Write the raw capture byte-for-byte.
    pub async fn write_capture(&self, raw: &str) -> Result<PathBuf> {
        let path = self.capture_path();
        tokio::fs::write(&path, raw.as_bytes()).await?;
        info!("raw capture written to {}", path.display());
        Ok(path)
    }

    pub async fn write_report(
        &self,
        doc: &ReportDocument,
        format: ReportFormat,
    ) -> Result<PathBuf> {
        let body = match format {
            ReportFormat::Html => doc.to_html(),
            ReportFormat::Json => doc.to_json()?,
        };
        let path = self.report_path(format);
        tokio::fs::write(&path, body).await?;
        info!("report written to {}", path.display());
        Ok(path)
    }

    /// Write both artifacts.
    pub async fn write_all(
        &self,
        raw: &str,
        doc: &ReportDocument,
        format: ReportFormat,
    ) -> Result<ArtifactPaths> {
        Ok(ArtifactPaths {
            capture: self.write_capture(raw).await?,
            report: self.write_report(doc, format).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::filter::{FilterKind, FilterSpec};
    use crate::report::{SessionMeta, render};
    use crate::trace::correlate;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap()
    }

    #[test]
    fn test_names_share_stem() {
        let writer = ArtifactWriter::new("/tmp/out", started());
        assert_eq!(
            writer.capture_path(),
            PathBuf::from("/tmp/out/output-01-03-2024_09-05-07.txt")
        );
        assert_eq!(
            writer.report_path(ReportFormat::Html),
            PathBuf::from("/tmp/out/output-01-03-2024_09-05-07.html")
        );
        assert_eq!(
            writer.report_path(ReportFormat::Json),
            PathBuf::from("/tmp/out/output-01-03-2024_09-05-07.json")
        );
    }

    #[tokio::test]
    async fn test_write_all() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path(), started());

        let raw = "id=1 trace_id=2 a\r\n\r\nnoise\r\nid=3 trace_id=2 b\r\n";
        let filter = FilterSpec::build(FilterKind::PortAny, "53", None).unwrap();
        let doc = render(&correlate(raw), &SessionMeta::new("fw", &filter));

        let paths = writer.write_all(raw, &doc, ReportFormat::Json).await.unwrap();

        assert_eq!(std::fs::read(&paths.capture).unwrap(), raw.as_bytes());
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.report).unwrap()).unwrap();
        assert_eq!(json["sections"][0]["lines"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_run_still_writes_both() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path(), started());
        let filter = FilterSpec::build(FilterKind::AddrDst, "10.1.1.1", None).unwrap();
        let doc = render(&correlate(""), &SessionMeta::new("fw", &filter));

        let paths = writer.write_all("", &doc, ReportFormat::Html).await.unwrap();

        assert!(std::fs::read(&paths.capture).unwrap().is_empty());
        let html = std::fs::read_to_string(&paths.report).unwrap();
        assert!(html.contains("<h3>Host: fw</h3>"));
        assert_eq!(html.matches("<button").count(), 0);
    }
}
