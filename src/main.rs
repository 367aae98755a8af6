use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    book_tracker::logging::init().context("init logging")?;

    let cli = book_tracker::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        book_tracker::cli::Command::Serve(args) => {
            book_tracker::app::serve(args).await.context("serve")?;
        }
        book_tracker::cli::Command::Admin { command } => {
            book_tracker::admin::run(command).await.context("admin")?;
        }
    }

    Ok(())
}
