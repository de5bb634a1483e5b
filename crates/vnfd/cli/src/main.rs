mod args;
mod commands;
mod logger;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    self::args::Args::parse().run()
}
