use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Structured record printed to stdout after the wrapped tool exits 0.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub tool: String,
    pub job_id: String,
    pub outputs: BTreeMap<String, PathBuf>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub reports: BTreeMap<String, PathBuf>,
    pub completed_at: DateTime<Utc>,
}

impl CompletionSummary {
    pub fn new(tool: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            job_id: job_id.into(),
            outputs: BTreeMap::new(),
            reports: BTreeMap::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn with_output(mut self, name: &str, path: &Path) -> Self {
        self.outputs.insert(name.to_string(), path.to_path_buf());
        self
    }

    /// Unset optional outputs are left out of the summary entirely.
    pub fn with_optional_output(self, name: &str, path: Option<&Path>) -> Self {
        match path {
            Some(path) => self.with_output(name, path),
            None => self,
        }
    }

    pub fn with_report(mut self, name: &str, path: &Path) -> Self {
        self.reports.insert(name.to_string(), path.to_path_buf());
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
