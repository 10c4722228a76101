//
// config.rs
// Dicom-Pseudonymizer-rs
//
// Pipeline configuration: the category/provider taxonomy, the work area, and the unmapped-patient policy.
//

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PseudonymError, Result};

pub const DEFAULT_WORK_DIR: &str = "tmp/incisive2";

const DEFAULT_CATEGORIES: [&str; 4] = ["breast", "colorectal", "lung", "prostate"];
const DEFAULT_PROVIDERS: [&str; 2] = ["dp1", "dp2"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub providers: Vec<String>,
}

/// Ordered categories, each with an ordered provider list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Every (category, provider) pair in declaration order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.categories.iter().flat_map(|c| {
            c.providers
                .iter()
                .map(move |p| (c.name.as_str(), p.as_str()))
        })
    }

    /// Names become path segments, so they must be plain, unique, non-empty components.
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(PseudonymError::InvalidTaxonomy("no categories".into()));
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            check_segment(&category.name)?;
            if !seen.insert(category.name.as_str()) {
                return Err(PseudonymError::InvalidTaxonomy(format!(
                    "duplicate category {:?}",
                    category.name
                )));
            }
            let mut providers = HashSet::new();
            for provider in &category.providers {
                check_segment(provider)?;
                if !providers.insert(provider.as_str()) {
                    return Err(PseudonymError::InvalidTaxonomy(format!(
                        "duplicate provider {:?} in category {:?}",
                        provider, category.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|name| Category {
                name: name.to_string(),
                providers: DEFAULT_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            })
            .collect();
        Self { categories }
    }
}

fn check_segment(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(PseudonymError::InvalidTaxonomy(format!(
            "{name:?} is not a valid directory name"
        )))
    }
}

/// What to do with a patient whose code has no entry in the category table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Rename to `{provider}-` and keep going; the code is listed in the report.
    #[default]
    Degenerate,
    /// Leave the patient subtree untouched.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub work_dir: PathBuf,
    #[serde(rename = "categories")]
    pub taxonomy: Taxonomy,
    pub unmapped_patients: UnmappedPolicy,
    /// Hash the source tree before and after the run to prove it was not touched.
    pub verify_source: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            taxonomy: Taxonomy::default(),
            unmapped_patients: UnmappedPolicy::default(),
            verify_source: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(contents).map_err(|source| PseudonymError::Config {
                path: origin.to_path_buf(),
                source,
            })?;
        config.taxonomy.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| PseudonymError::io(path, e))?;
        Self::from_toml_str(&contents, path)
    }
}
