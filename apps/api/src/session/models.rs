use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shown in place of the final text when a submission fails.
pub const GENERIC_FAILURE_MESSAGE: &str = "Error occurred while processing the resume.";

/// One uploaded résumé. Lives only as long as its session.
#[derive(Debug, Clone)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub name: String,
    pub content: Bytes,
    /// Filled in by the first submission that extracts this file.
    pub text: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn new(name: String, content: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            content,
            text: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> ResumeSummary {
        ResumeSummary {
            id: self.id,
            name: self.name.clone(),
            size_bytes: self.content.len(),
            extracted: self.text.is_some(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// What the API exposes about a record. Raw bytes never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeSummary {
    pub id: Uuid,
    pub name: String,
    pub size_bytes: usize,
    pub extracted: bool,
    pub uploaded_at: DateTime<Utc>,
}

/// How much creative liberty the rewrite may take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbellishmentLevel {
    /// Facts only; nothing invented.
    #[default]
    None,
    /// Polish wording and surface achievements; facts unchanged.
    Moderate,
    /// Free to expand and enrich content.
    Creative,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingConfig {
    #[serde(default)]
    pub level: EmbellishmentLevel,
    #[serde(default)]
    pub job_requirements: String,
    /// Model identifier sent upstream. `None` uses the server default.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    #[default]
    Idle,
    Extracting,
    Streaming,
    Completed,
    Failed,
}

impl OutputStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, OutputStatus::Extracting | OutputStatus::Streaming)
    }
}

/// Reasoning and final text of the latest submission. Append-only while
/// streaming; cleared when the next submission starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputAccumulator {
    pub reasoning: String,
    pub content: String,
    pub status: OutputStatus,
    pub error: Option<String>,
}

impl OutputAccumulator {
    pub fn reset(&mut self) {
        self.reasoning.clear();
        self.content.clear();
        self.error = None;
        self.status = OutputStatus::Extracting;
    }

    pub fn push_content(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    pub fn push_reasoning(&mut self, chunk: &str) {
        self.reasoning.push_str(chunk);
    }

    pub fn complete(&mut self) {
        if self.status != OutputStatus::Failed {
            self.status = OutputStatus::Completed;
        }
    }

    pub fn fail(&mut self) {
        self.content = GENERIC_FAILURE_MESSAGE.to_string();
        self.error = Some(GENERIC_FAILURE_MESSAGE.to_string());
        self.status = OutputStatus::Failed;
    }
}
