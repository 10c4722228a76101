//
// rename.rs
// Dicom-Pseudonymizer-rs
//
// Walks one provider subtree (patient → study → series → record), renaming directories and rewriting records.
//

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::anonymize::{anonymize_record, is_record};
use crate::config::UnmappedPolicy;
use crate::error::{PseudonymError, Result};
use crate::mapping::{load_table, lookup, patient_mapping_path, resolve_by_key};
use crate::models::{FailedPatient, ProviderReport};
use crate::naming;

/// Folder between a provider directory and its patient directories.
pub const DATA_DIR: &str = "data";

/// Mapping-table locations and policy shared by every provider walk of a run.
#[derive(Debug, Clone, Copy)]
pub struct RenameContext<'a> {
    pub global_mapping: &'a Path,
    pub provider_lookup: &'a Path,
    pub unmapped: UnmappedPolicy,
}

/// Pseudonymize the working copy of `provider` under `provider_dir`.
///
/// Progress is accumulated into `report` as the walk goes. Failures below a patient directory
/// are recorded on the report and the walk moves on to the next patient; only mapping-table
/// errors and I/O errors on the data directory itself end the walk early. Directory identities
/// are resolved independently of listing order.
pub fn pseudonymize_provider(
    ctx: &RenameContext<'_>,
    category: &str,
    provider: &str,
    provider_dir: &Path,
    report: &mut ProviderReport,
) -> Result<()> {
    let data_dir = provider_dir.join(DATA_DIR);
    if !data_dir.is_dir() {
        return Err(PseudonymError::io(
            &data_dir,
            io::Error::new(io::ErrorKind::NotFound, "provider data directory is missing"),
        ));
    }

    let provider_id = resolve_by_key(provider, ctx.global_mapping, ctx.provider_lookup)?;
    if provider_id.is_empty() {
        warn!(category, provider, "provider has no mapped identifier");
    }
    report.provider_id = provider_id.clone();

    let patients = load_table(&patient_mapping_path(&data_dir, category))?;
    let patient_dirs = subdirectories(&data_dir)?;
    info!(category, provider, patients = patient_dirs.len(), "pseudonymizing provider");

    for patient_dir in patient_dirs {
        let old_name = dir_name(&patient_dir);
        let code = naming::patient_code(&old_name);
        let patient_id = lookup(&patients, code);

        if patient_id.is_empty() {
            match ctx.unmapped {
                UnmappedPolicy::Skip => {
                    warn!(category, provider, patient = %old_name, "unmapped patient skipped");
                    report.skipped_patients.push(old_name.clone());
                    continue;
                }
                UnmappedPolicy::Degenerate => {
                    warn!(category, provider, patient = %old_name, "unmapped patient renamed without patient id");
                    report.unmapped_patients.push(code.to_string());
                }
            }
        }

        if let Err(e) = pseudonymize_patient(&patient_dir, &provider_id, &patient_id, report) {
            warn!(category, provider, patient = %old_name, error = %e, "patient left partially renamed");
            report.failed_patients.push(FailedPatient {
                patient: old_name.clone(),
                reason: e.to_string(),
            });
        }
    }

    Ok(())
}

/// Rename one patient directory, its studies, and rewrite the records below them.
///
/// A study that cannot be renamed is reported and its siblings are still processed.
fn pseudonymize_patient(
    patient_dir: &Path,
    provider_id: &str,
    patient_id: &str,
    report: &mut ProviderReport,
) -> Result<()> {
    let pseudonym = naming::pseudonym(provider_id, patient_id);
    let patient_path = rename_dir(patient_dir, &pseudonym)?;
    report.patients_renamed += 1;

    let mut first_error = None;
    for study_dir in subdirectories(&patient_path)? {
        let suffix = naming::study_suffix(&dir_name(&study_dir)).to_string();
        let study_path = match rename_dir(&study_dir, &naming::study_name(&pseudonym, &suffix)) {
            Ok(path) => path,
            Err(e) => {
                first_error.get_or_insert(e);
                continue;
            }
        };
        report.studies_renamed += 1;

        if let Err(e) = anonymize_study(&study_path, provider_id, patient_id, report) {
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn anonymize_study(
    study_path: &Path,
    provider_id: &str,
    patient_id: &str,
    report: &mut ProviderReport,
) -> Result<()> {
    for series_dir in subdirectories(study_path)? {
        for record in records(&series_dir)? {
            let outcome = anonymize_record(&record, provider_id, patient_id);
            report.record(record, outcome);
        }
    }
    Ok(())
}

/// Rename `from` to a sibling called `new_name`, never replacing an existing entry.
pub fn rename_dir(from: &Path, new_name: &str) -> Result<PathBuf> {
    let to = match from.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    };
    if to == from {
        return Ok(to);
    }
    if fs::symlink_metadata(&to).is_ok() {
        return Err(PseudonymError::RenameCollision {
            from: from.to_path_buf(),
            to,
        });
    }
    fs::rename(from, &to).map_err(|source| PseudonymError::Rename {
        from: from.to_path_buf(),
        to: to.clone(),
        source,
    })?;
    debug!(from = %from.display(), to = %to.display(), "renamed");
    Ok(to)
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn list(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .map_err(|e| PseudonymError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| PseudonymError::io(dir, e))?;
    // Stable order keeps logs and reports reproducible.
    paths.sort();
    Ok(paths)
}

pub(crate) fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

fn records(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list(dir)?
        .into_iter()
        .filter(|p| p.is_file() && is_record(p))
        .collect())
}
