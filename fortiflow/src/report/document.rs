//! Structural report model.

use serde::Serialize;

use crate::error::MalformedGroupError;
use crate::filter::FilterSpec;
use crate::trace::{FlowHeader, TraceCorrelationResult, TraceGroup};

/// Report title.
pub const TITLE: &str = "Diagnose Debug Flow Report";

/// Session facts shown in the report title block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionMeta {
    pub host: String,
    pub filter_type: String,
    pub option1: String,
    /// Empty when no second option was supplied.
    pub option2: String,
}

impl SessionMeta {
    pub fn new(host: impl Into<String>, filter: &FilterSpec) -> Self {
        Self {
            host: host.into(),
            filter_type: filter.kind().to_string(),
            option1: filter.option1().to_string(),
            option2: filter.option2().unwrap_or_default().to_string(),
        }
    }
}

/// A section's visible label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionHeader {
    Derived(FlowHeader),
    Unavailable(MalformedGroupError),
}

impl SectionHeader {
    pub fn label(&self) -> String {
        match self {
            SectionHeader::Derived(header) => header.to_string(),
            SectionHeader::Unavailable(err) => {
                format!("header unavailable (trace_id={})", err.trace_id)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SectionHeader::Derived(_))
    }
}

/// One collapsible block: a label and the flow's raw lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub trace_id: String,
    pub label: String,
    pub header: SectionHeader,
    pub lines: Vec<String>,
}

impl ReportSection {
    fn from_group(group: &TraceGroup) -> Self {
        let header = match group.header() {
            Ok(header) => SectionHeader::Derived(header),
            Err(err) => SectionHeader::Unavailable(err),
        };
        Self {
            trace_id: group.trace_id().to_string(),
            label: header.label(),
            header,
            lines: group.lines().map(str::to_string).collect(),
        }
    }
}

/// The whole report for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    #[serde(flatten)]
    pub meta: SessionMeta,
    pub sections: Vec<ReportSection>,
}

impl ReportDocument {
    /// Groups whose header could not be derived.
    pub fn malformed(&self) -> impl Iterator<Item = &MalformedGroupError> {
        self.sections.iter().filter_map(|s| match &s.header {
            SectionHeader::Unavailable(err) => Some(err),
            SectionHeader::Derived(_) => None,
        })
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the report for `result`.
///
/// Pure: the same inputs always give an equal document. Groups whose header
/// cannot be derived still get a section, labelled as unavailable.
pub fn render(result: &TraceCorrelationResult, meta: &SessionMeta) -> ReportDocument {
    ReportDocument {
        title: TITLE.to_string(),
        meta: meta.clone(),
        sections: result.groups().map(ReportSection::from_group).collect(),
    }
}
