//
// error.rs
// Dicom-Pseudonymizer-rs
//
// Error kinds raised by the pseudonymization pipeline and the policy deciding which ones abort a run.
//

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PseudonymError>;

#[derive(Debug, Error)]
pub enum PseudonymError {
    /// A mapping table the run depends on does not exist.
    #[error("mapping file not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    /// A mapping table exists but is not a flat string-to-string JSON object.
    #[error("malformed mapping file {}: {source}", path.display())]
    MalformedMapping {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot rename {} to {}: target already exists", from.display(), to.display())]
    RenameCollision { from: PathBuf, to: PathBuf },

    #[error("work area {} overlaps source tree {}", work_dir.display(), source_root.display())]
    WorkAreaOverlap {
        work_dir: PathBuf,
        source_root: PathBuf,
    },

    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    #[error("invalid configuration file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("identifier pool {lo}..={hi} exhausted")]
    IdPoolExhausted { lo: u32, hi: u32 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PseudonymError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        PseudonymError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error invalidates the whole run rather than a single provider subtree.
    ///
    /// Missing or malformed mapping tables make every later resolution meaningless,
    /// so they abort. Rename and filesystem failures inside a provider only stop that provider.
    pub fn aborts_run(&self) -> bool {
        match self {
            PseudonymError::ResourceNotFound { .. }
            | PseudonymError::MalformedMapping { .. }
            | PseudonymError::WorkAreaOverlap { .. }
            | PseudonymError::InvalidTaxonomy(_)
            | PseudonymError::Config { .. }
            | PseudonymError::IdPoolExhausted { .. } => true,
            PseudonymError::Rename { .. }
            | PseudonymError::RenameCollision { .. }
            | PseudonymError::Io { .. } => false,
        }
    }
}
