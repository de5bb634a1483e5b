mod package;
mod topology;
mod upload;
mod validate;

use std::{fs, path::Path};

use anyhow::{anyhow, Result};
use clap::Subcommand;
use vnfd_api::{descriptor::Descriptor, entity::RawMapping};

#[derive(Subcommand)]
pub(crate) enum Command {
    Validate(self::validate::Args),
    Topology(self::topology::Args),
    Package(self::package::Args),
    Upload(self::upload::Args),
}

impl Command {
    pub(crate) fn run(self) -> Result<()> {
        match self {
            Self::Validate(args) => args.run(),
            Self::Topology(args) => args.run(),
            Self::Package(args) => args.run(),
            Self::Upload(args) => args.run(),
        }
    }
}

pub(crate) fn load_descriptor(path: &Path) -> Result<Descriptor> {
    let file = fs::read_to_string(path)
        .map_err(|error| anyhow!("failed to read the descriptor file {path:?}: {error}"))?;
    let document: RawMapping = ::serde_yaml::from_str(&file)
        .map_err(|error| anyhow!("failed to parse the descriptor file {path:?}: {error}"))?;
    Descriptor::from_document(&document)
        .map_err(|error| anyhow!("failed to load the descriptor: {error}"))
}
