use crate::commands::Command;
use clap::Parser;

/// Turn raw RGBA8 pixel dumps into PNG images
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        self.command.run()?;
        Ok(())
    }
}
