//
// mapping.rs
// Dicom-Pseudonymizer-rs
//
// Persists old→new identifier tables as JSON files and resolves identifiers through them.
//

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::{PseudonymError, Result};

/// Old identifier (or provider name) to new identifier.
pub type MappingTable = BTreeMap<String, String>;

/// Location of the per-category patient table inside a provider's data directory.
pub fn patient_mapping_path(data_dir: &Path, category: &str) -> PathBuf {
    data_dir.join(format!("id_mapping_{category}.json"))
}

/// Write `table` to `path`, replacing whatever was there.
pub fn save_table(table: &MappingTable, path: &Path) -> Result<()> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    table
        .serialize(&mut serializer)
        .map_err(|e| PseudonymError::io(path, io::Error::from(e)))?;
    fs::write(path, buf).map_err(|e| PseudonymError::io(path, e))
}

/// Read a flat string-to-string JSON object from `path`.
pub fn load_table(path: &Path) -> Result<MappingTable> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PseudonymError::ResourceNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(PseudonymError::io(path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|source| PseudonymError::MalformedMapping {
        path: path.to_path_buf(),
        source,
    })
}

/// In-memory lookup; a miss yields an empty string so the walk keeps going.
pub fn lookup(table: &MappingTable, key: &str) -> String {
    table.get(key).cloned().unwrap_or_default()
}

/// Resolve `old_id` through the table stored at `mapping_path`.
pub fn resolve_by_id(old_id: &str, mapping_path: &Path) -> Result<String> {
    let table = load_table(mapping_path)?;
    Ok(lookup(&table, old_id))
}

/// Resolve a provider by name: name → old code via the lookup table, then old code → new id
/// via the global table. Either miss yields an empty string.
pub fn resolve_by_key(
    provider_name: &str,
    global_mapping_path: &Path,
    provider_lookup_path: &Path,
) -> Result<String> {
    let global = load_table(global_mapping_path)?;
    let providers = load_table(provider_lookup_path)?;
    Ok(providers
        .get(provider_name)
        .map(|old_id| lookup(&global, old_id))
        .unwrap_or_default())
}
