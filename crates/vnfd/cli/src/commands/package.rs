use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, instrument, Level};
use vnfd_package::bundle::{BootScript, Bundle};

/// Write the package bundle of a descriptor document to disk.
#[derive(Parser)]
pub(crate) struct Args {
    /// Path of the descriptor document
    file: PathBuf,

    /// Directory of boot-customization scripts
    #[arg(long)]
    scripts: Option<PathBuf>,

    /// Directory the bundle is written into
    #[arg(long, default_value = ".")]
    output: PathBuf,
}

impl Args {
    #[instrument(name = "package", level = Level::INFO, skip_all, err(Display))]
    pub(crate) fn run(self) -> Result<()> {
        let descriptor = super::load_descriptor(&self.file)?;
        let scripts = match &self.scripts {
            Some(dir) => BootScript::read_dir(dir)?,
            None => Vec::default(),
        };

        let bundle = Bundle::assemble(&descriptor, scripts)?;
        let root = bundle.write(&self.output)?;
        info!("wrote the package bundle to {root:?}");
        Ok(())
    }
}
