mod display;
mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "redpen", version, about = "Incremental writing-analysis engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a text file and print suggestions.
    Check(run::CheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("redpen v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Command::Check(args) => run::run_check(args).await,
    }
}
