use dicom::object::open_file;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::dicom_access::IdentityFields;
use crate::models::RecordOutcome;
use crate::naming;

/// Whether `path` is a record file the walk should rewrite.
pub fn is_record(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "dcm")
}

/// Overwrite PatientName and PatientID of the record at `path` with `{provider}-{patient}`.
///
/// Never fails: a record that cannot be parsed or written back is reported as skipped and left
/// exactly as it was on disk.
pub fn anonymize_record(path: &Path, new_provider_id: &str, new_patient_id: &str) -> RecordOutcome {
    let outcome = rewrite(path, &naming::pseudonym(new_provider_id, new_patient_id));
    match &outcome {
        RecordOutcome::Anonymized => debug!(record = %path.display(), "record anonymized"),
        RecordOutcome::Skipped { reason } => {
            warn!(record = %path.display(), %reason, "record left unmodified")
        }
    }
    outcome
}

fn rewrite(path: &Path, pseudonym: &str) -> RecordOutcome {
    // The object owns no file handle once open_file returns.
    let mut obj = match open_file(path) {
        Ok(obj) => obj,
        Err(e) => return skipped(format!("cannot read DICOM record: {e}")),
    };

    obj.set_identity(pseudonym);

    // Write next to the original and swap it in, so a failed write never truncates the record.
    let staging = staging_path(path);
    if let Err(e) = obj.write_to_file(&staging) {
        let _ = fs::remove_file(&staging);
        return skipped(format!("cannot write DICOM record: {e}"));
    }
    // The replacement keeps the original file mode.
    let permissions = fs::metadata(path).map(|meta| meta.permissions());
    if let Err(e) = permissions.and_then(|perms| fs::set_permissions(&staging, perms)) {
        let _ = fs::remove_file(&staging);
        return skipped(format!("cannot carry over record permissions: {e}"));
    }
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return skipped(format!("cannot replace DICOM record: {e}"));
    }

    RecordOutcome::Anonymized
}

fn skipped(reason: String) -> RecordOutcome {
    RecordOutcome::Skipped { reason }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    p.set_file_name(format!(".{name}.pseudo-tmp"));
    p
}
