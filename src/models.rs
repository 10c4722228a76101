//
// models.rs
// Dicom-Pseudonymizer-rs
//
// Serializable outcome types for single records, provider walks, and whole pipeline runs.
//

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one record file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Anonymized,
    /// The record was left byte-for-byte unchanged.
    Skipped { reason: String },
}

/// A patient whose subtree could not be fully renamed; its remaining names are unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPatient {
    pub patient: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub path: PathBuf,
    pub reason: String,
}

/// Tally for one (category, provider) subtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderReport {
    pub category: String,
    pub provider: String,
    /// New provider identifier; empty when the provider has no mapping.
    pub provider_id: String,
    pub patients_renamed: usize,
    /// Old patient codes without a mapping entry.
    pub unmapped_patients: Vec<String>,
    /// Patient directories left untouched under the skip policy.
    pub skipped_patients: Vec<String>,
    pub failed_patients: Vec<FailedPatient>,
    pub studies_renamed: usize,
    pub records_anonymized: usize,
    pub records_skipped: Vec<SkippedRecord>,
    /// Set when the walk of this provider stopped early.
    pub error: Option<String>,
}

impl ProviderReport {
    pub fn new(category: &str, provider: &str) -> Self {
        Self {
            category: category.to_string(),
            provider: provider.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, path: PathBuf, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Anonymized => self.records_anonymized += 1,
            RecordOutcome::Skipped { reason } => {
                self.records_skipped.push(SkippedRecord { path, reason })
            }
        }
    }

    /// The walk reached every patient and none of them failed.
    pub fn completed(&self) -> bool {
        self.error.is_none() && self.failed_patients.is_empty()
    }
}

/// Summary of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub source_root: PathBuf,
    pub work_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub providers: Vec<ProviderReport>,
    /// `Some(true)` when the source tree was fingerprinted before and after and matched.
    pub source_unchanged: Option<bool>,
}

impl PipelineReport {
    pub fn records_anonymized(&self) -> usize {
        self.providers.iter().map(|p| p.records_anonymized).sum()
    }

    pub fn records_skipped(&self) -> usize {
        self.providers.iter().map(|p| p.records_skipped.len()).sum()
    }

    pub fn failed_providers(&self) -> impl Iterator<Item = &ProviderReport> {
        self.providers.iter().filter(|p| !p.completed())
    }
}
