use anyhow::Result;
use clap::{Parser, Subcommand};

mod tasks;

#[derive(Parser)]
#[command(
    name = "burn-segmentation",
    about = "U-Net and SegNet binary segmentation toolkit",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and keep the best checkpoint by validation loss.
    Train(tasks::train::TrainArgs),
    /// Score a trained model and render its predictions.
    Eval(tasks::eval::EvalArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Train(args) => tasks::train::run(args),
        Commands::Eval(args) => tasks::eval::run(args),
    }
}
