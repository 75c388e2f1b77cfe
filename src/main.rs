use clap::Parser;
use qa_pipeline::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Evaluate(args) => cli::evaluate::run(args).await,
        Command::Metrics(args) => cli::metrics::run(args).await,
    }
}
