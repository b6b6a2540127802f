use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use mdharvest::cli::{Cli, Command};
use mdharvest::commands;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    mdharvest::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Discover(args) => commands::discover(args).await.context("discover")?,
        Command::Crawl(args) => commands::crawl(args).await.context("crawl")?,
        Command::Site(args) => commands::site(args).await.context("site")?,
        Command::Pdf(args) => commands::pdf(args).await.context("pdf")?,
        Command::Prune(args) => commands::prune(args).await.context("prune")?,
        Command::Chapters(args) => commands::chapters(args).context("chapters")?,
        Command::Qa(args) => commands::qa(args).await.context("qa")?,
        Command::Summarize(args) => commands::summarize(args).await.context("summarize")?,
        Command::Sweep(args) => commands::sweep(args).context("sweep")?,
    }

    Ok(())
}
