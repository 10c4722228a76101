//
// pipeline.rs
// Dicom-Pseudonymizer-rs
//
// Stages the source tree into the work area and drives the provider walk over every taxonomy entry.
//

use std::path::Path;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{PipelineReport, ProviderReport};
use crate::rename::{pseudonymize_provider, RenameContext};
use crate::workspace::{stage_copy, tree_fingerprint, WorkArea};

/// Run the pipeline with the default configuration.
pub fn pseudonymize(
    source_root: &Path,
    global_mapping_path: &Path,
    provider_lookup_path: &Path,
) -> Result<PipelineReport> {
    Pipeline::new(PipelineConfig::default()).run(source_root, global_mapping_path, provider_lookup_path)
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Copy `source_root` into the work area and pseudonymize every (category, provider) pair.
    ///
    /// The source tree is only read. Mapping-table errors abort the run; any other failure
    /// inside a provider is recorded on that provider's report and the run moves on.
    pub fn run(
        &self,
        source_root: &Path,
        global_mapping_path: &Path,
        provider_lookup_path: &Path,
    ) -> Result<PipelineReport> {
        let started_at = Utc::now();
        self.config.taxonomy.validate()?;

        let fingerprint_before = if self.config.verify_source {
            Some(tree_fingerprint(source_root)?)
        } else {
            None
        };

        let work = WorkArea::prepare(&self.config.work_dir, source_root)?;
        let staged = stage_copy(source_root, work.root())?;
        info!(
            source = %source_root.display(),
            work_dir = %work.root().display(),
            files = staged,
            "work area ready"
        );

        let ctx = RenameContext {
            global_mapping: global_mapping_path,
            provider_lookup: provider_lookup_path,
            unmapped: self.config.unmapped_patients,
        };

        let mut providers = Vec::new();
        for (category, provider) in self.config.taxonomy.pairs() {
            let mut report = ProviderReport::new(category, provider);
            let provider_dir = work.provider_dir(category, provider);
            if let Err(e) = pseudonymize_provider(&ctx, category, provider, &provider_dir, &mut report) {
                if e.aborts_run() {
                    error!(category, provider, error = %e, "aborting run");
                    return Err(e);
                }
                error!(category, provider, error = %e, "provider walk stopped");
                report.error = Some(e.to_string());
            }
            info!(
                category,
                provider,
                patients = report.patients_renamed,
                records = report.records_anonymized,
                skipped = report.records_skipped.len(),
                "provider done"
            );
            providers.push(report);
        }

        let source_unchanged = match fingerprint_before {
            Some(before) => {
                let unchanged = tree_fingerprint(source_root)? == before;
                if !unchanged {
                    warn!(source = %source_root.display(), "source tree changed during the run");
                }
                Some(unchanged)
            }
            None => None,
        };

        Ok(PipelineReport {
            source_root: source_root.to_path_buf(),
            work_dir: work.root().to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            providers,
            source_unchanged,
        })
    }
}
