use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{instrument, Level};
use vnfd_package::{
    bundle::{BootScript, Bundle},
    upload::{self, SshShell},
};

/// Push the package bundle to a remote host and create the package there.
#[derive(Parser)]
pub(crate) struct Args {
    /// Path of the descriptor document
    file: PathBuf,

    /// Remote host name or address
    #[arg(long, env = "VNFD_UPLOAD_HOST")]
    host: String,

    /// Remote user name
    #[arg(long, env = "VNFD_UPLOAD_USER")]
    user: String,

    /// Directory of boot-customization scripts
    #[arg(long)]
    scripts: Option<PathBuf>,
}

impl Args {
    #[instrument(name = "upload", level = Level::INFO, skip_all, err(Display))]
    pub(crate) fn run(self) -> Result<()> {
        let descriptor = super::load_descriptor(&self.file)?;
        let scripts = match &self.scripts {
            Some(dir) => BootScript::read_dir(dir)?,
            None => Vec::default(),
        };

        let bundle = Bundle::assemble(&descriptor, scripts)?;
        let mut shell = SshShell::new(&self.user, &self.host);
        upload::upload(&mut shell, &bundle)
    }
}
