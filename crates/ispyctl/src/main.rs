//! iSpy Control - CLI client for the iSpy diagnostics engine

use clap::Parser;
use ispy_shared::IspyError;
use ispyctl::cli::Cli;
use ispyctl::session::{load_config, Session};
use ispyctl::{commands, logging};
use owo_colors::OwoColorize;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red(), e);
            let code = e
                .downcast_ref::<IspyError>()
                .map(IspyError::code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let session = Session::start(config, cli.device.as_deref()).await?;
    commands::run(&session, cli.command_or_default()).await
}
