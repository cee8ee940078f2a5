use anyhow::Result;
use butterfly::cli::{commands, Cli};
use butterfly::logging;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;
    commands::run(cli)
}
