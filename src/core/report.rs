use butterfly_extensions::{TranscriptEntry, TranscriptRecordSummary};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Aggregate verdict of a transformation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationOutcome {
    /// Every executed node finished NO_OP/NULL/SUCCESS/VALUE.
    Complete,
    /// At least one warning, no error.
    CompleteWithWarnings,
    /// At least one recorded error, or the run was cancelled.
    Incomplete,
}

impl fmt::Display for TransformationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformationOutcome::Complete => "COMPLETE",
            TransformationOutcome::CompleteWithWarnings => "COMPLETE_WITH_WARNINGS",
            TransformationOutcome::Incomplete => "INCOMPLETE",
        };
        write!(f, "{}", name)
    }
}

/// Final report handed back to the host once a run finishes.
#[derive(Debug)]
pub struct TransformationReport {
    pub run_id: Uuid,
    pub template: String,
    pub transformed_folder: PathBuf,
    pub outcome: TransformationOutcome,
    /// Set when the run was ended by external cancellation or timeout.
    pub cancelled: bool,
    pub transcript: Vec<TranscriptEntry>,
    pub manual_instructions: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub properties: IndexMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl TransformationReport {
    /// Serializable rendering written by `--report`.
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            run_id: self.run_id,
            template: self.template.clone(),
            transformed_folder: self.transformed_folder.clone(),
            outcome: self.outcome,
            cancelled: self.cancelled,
            transcript: self
                .transcript
                .iter()
                .map(|entry| TranscriptEntrySummary {
                    node_path: entry.node_path.clone(),
                    record: entry.record.summary(),
                })
                .collect(),
            manual_instructions: self.manual_instructions.clone(),
            archive: self.archive.clone(),
            properties: self.properties.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntrySummary {
    pub node_path: String,
    #[serde(flatten)]
    pub record: TranscriptRecordSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub template: String,
    pub transformed_folder: PathBuf,
    pub outcome: TransformationOutcome,
    pub cancelled: bool,
    pub transcript: Vec<TranscriptEntrySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_instructions: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
