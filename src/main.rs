//
// main.rs
// Dicom-Pseudonymizer-rs
//
// Binary entry point that hands off execution to the CLI layer.
//

use dicom_pseudonymizer::cli;

fn main() -> anyhow::Result<()> {
    // Delegate all argument parsing and dispatching to the CLI module.
    cli::run()
}
