//
// lib.rs
// Dicom-Pseudonymizer-rs
//
// Exposes the crate's modules and re-exports the pipeline entry point for both binary and library consumers.
//

// Public surface of the library: leaves first, then the walk and the pipeline that drives it.
pub mod anonymize;
pub mod cli;
pub mod config;
pub mod dicom_access;
pub mod error;
pub mod generate;
pub mod ids;
pub mod mapping;
pub mod models;
pub mod naming;
pub mod pipeline;
pub mod rename;
pub mod workspace;

pub use cli::{run as run_cli, Cli, Commands};
pub use config::{PipelineConfig, Taxonomy, UnmappedPolicy};
pub use error::{PseudonymError, Result};
pub use pipeline::{pseudonymize, Pipeline};
