mod cli;
mod codec;
mod commands;
mod error;
mod gfx;
mod img;
mod util;

use clap::Parser;
use env_logger::Env;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    cli::Cli::parse().run()
}
