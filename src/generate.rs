//
// generate.rs
// Dicom-Pseudonymizer-rs
//
// Builds the provider and per-category patient mapping tables consumed by the pseudonymization walk.
//

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{info, warn};

use crate::config::Taxonomy;
use crate::error::Result;
use crate::ids::{IdGenerator, IdRange};
use crate::mapping::{load_table, patient_mapping_path, save_table, MappingTable};
use crate::naming;
use crate::rename::{dir_name, subdirectories, DATA_DIR};

/// The two global tables derived from the provider lookup ("original") table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderTables {
    /// Provider name → new provider id.
    pub new_data: MappingTable,
    /// Old provider code → new provider id.
    pub id_mapping: MappingTable,
}

/// Give every provider of `original` (name → old code) a unique 3-digit id.
///
/// Providers that share an old code share the new id, keeping `id_mapping` a function.
pub fn build_provider_tables<R: Rng>(original: &MappingTable, rng: R) -> Result<ProviderTables> {
    let mut ids = IdGenerator::new(rng, IdRange::PROVIDER);
    let mut tables = ProviderTables::default();
    for (name, old_id) in original {
        let new_id = match tables.id_mapping.get(old_id) {
            Some(id) => id.clone(),
            None => {
                let id = ids.next_id()?;
                tables.id_mapping.insert(old_id.clone(), id.clone());
                id
            }
        };
        tables.new_data.insert(name.clone(), new_id);
    }
    Ok(tables)
}

pub fn generate_provider_tables<R: Rng>(
    original_path: &Path,
    new_data_path: &Path,
    id_mapping_path: &Path,
    rng: R,
) -> Result<ProviderTables> {
    let original = load_table(original_path)?;
    let tables = build_provider_tables(&original, rng)?;
    save_table(&tables.new_data, new_data_path)?;
    save_table(&tables.id_mapping, id_mapping_path)?;
    info!(
        providers = tables.new_data.len(),
        new_data = %new_data_path.display(),
        id_mapping = %id_mapping_path.display(),
        "provider tables written"
    );
    Ok(tables)
}

/// Map each patient code to a fresh 6-digit id drawn from `ids`.
///
/// The codes themselves are excluded first so no new id can be mistaken for an old one.
pub fn build_patient_table<R: Rng>(codes: &[String], ids: &mut IdGenerator<R>) -> Result<MappingTable> {
    ids.exclude(codes.iter().cloned());
    let mut table = MappingTable::new();
    for code in codes {
        if !table.contains_key(code) {
            table.insert(code.clone(), ids.next_id()?);
        }
    }
    Ok(table)
}

/// Write `id_mapping_{category}.json` into the data directory of every provider under `root`.
///
/// One generator serves a whole category, so patient ids are unique across its providers.
/// Providers without a data directory are skipped with a warning.
pub fn generate_patient_tables<R: Rng>(
    root: &Path,
    taxonomy: &Taxonomy,
    mut rng: R,
) -> Result<Vec<PathBuf>> {
    taxonomy.validate()?;
    let mut written = Vec::new();
    for category in taxonomy.categories() {
        let mut ids = IdGenerator::new(&mut rng, IdRange::PATIENT);
        for provider in &category.providers {
            let data_dir = root.join(&category.name).join(provider).join(DATA_DIR);
            if !data_dir.is_dir() {
                warn!(category = %category.name, provider = %provider, "no data directory, skipping");
                continue;
            }
            let codes: Vec<String> = subdirectories(&data_dir)?
                .iter()
                .map(|p| naming::patient_code(&dir_name(p)).to_string())
                .collect();
            let table = build_patient_table(&codes, &mut ids)?;
            let path = patient_mapping_path(&data_dir, &category.name);
            save_table(&table, &path)?;
            info!(
                category = %category.name,
                provider = %provider,
                patients = table.len(),
                "patient table written"
            );
            written.push(path);
        }
    }
    Ok(written)
}
