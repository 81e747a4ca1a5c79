//! Command handlers.

pub mod analytics;
pub mod chat;
pub mod devices;
pub mod report;
pub mod scan;

use crate::cli::Commands;
use crate::session::Session;
use anyhow::Result;

pub async fn run(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Devices { json } => devices::run(session, json).await,
        Commands::Scan { module, json } => scan::run(session, module.as_deref(), json).await,
        Commands::Report { output } => report::run(session, output.as_deref()).await,
        Commands::Analytics {
            samples,
            days,
            chart,
        } => analytics::run(session, samples, days, chart).await,
        Commands::Chat => chat::run(session).await,
    }
}
