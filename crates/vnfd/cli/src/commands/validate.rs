use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{info, instrument, Level};

/// Load a descriptor document, check every cross-reference and print the
/// normalized document.
#[derive(Parser)]
pub(crate) struct Args {
    /// Path of the descriptor document
    file: PathBuf,
}

impl Args {
    #[instrument(name = "validate", level = Level::INFO, skip_all, err(Display))]
    pub(crate) fn run(self) -> Result<()> {
        let descriptor = super::load_descriptor(&self.file)?;
        let document = ::serde_yaml::to_string(&descriptor.to_document())
            .map_err(|error| anyhow!("failed to serialize the descriptor document: {error}"))?;
        print!("{document}");
        info!("the descriptor {:?} is valid", descriptor.id());
        Ok(())
    }
}
