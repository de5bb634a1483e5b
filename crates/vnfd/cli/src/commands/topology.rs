use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{instrument, Level};
use vnfd_api::topology::Topology;

/// Emit the descriptor's node/edge list as JSON for an external graph
/// renderer.
#[derive(Parser)]
pub(crate) struct Args {
    /// Path of the descriptor document
    file: PathBuf,
}

impl Args {
    #[instrument(name = "topology", level = Level::INFO, skip_all, err(Display))]
    pub(crate) fn run(self) -> Result<()> {
        let descriptor = super::load_descriptor(&self.file)?;
        let topology = Topology::of(&descriptor);
        let output = ::serde_json::to_string_pretty(&topology)
            .map_err(|error| anyhow!("failed to serialize the topology: {error}"))?;
        println!("{output}");
        Ok(())
    }
}
