mod decode;
mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use decode::DecodeCommand;
use simulate::SimulateCommand;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    color: colorchoice_clap::Color,

    #[command(subcommand)]
    command: Commands,

    /// Output plain JSON without color and interactivity
    #[arg(short, long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    Decode(DecodeCommand),
    Simulate(SimulateCommand),
}

pub async fn execute() -> Result<()> {
    let cli = Cli::parse();

    cli.color.write_global();

    match &cli.command {
        Commands::Decode(cmd) => cmd.execute(&cli).await,
        Commands::Simulate(cmd) => cmd.execute(&cli).await,
    }
}
