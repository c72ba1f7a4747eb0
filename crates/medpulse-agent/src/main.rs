//! MedPulse command-line entry point.
//!
//! `medpulse run` fetches, curates, writes and publishes new articles;
//! `publish`, `delete` and `stats` are the administrative operations on
//! the same store.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use medpulse_common::Category;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "medpulse", version, about = "Bilingual medical-research news generator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch new papers, curate, write and publish (default)
    Run,
    /// Publish one PubMed record with a chosen category
    Publish {
        #[arg(long)]
        pmid: String,
        /// sleep, longevity, mental-health or general
        #[arg(long, default_value = "general")]
        category: Category,
    },
    /// Delete a published item by id
    Delete { id: String },
    /// Show store totals per category and the item listing
    Stats {
        /// Print `{ total, categories, news }` as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("medpulse=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::load()?;
    info!(store = %config.store.path, provider = config.llm.provider.as_str(), "Configuration loaded");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => commands::run(&config).await,
        Command::Publish { pmid, category } => commands::publish(&config, &pmid, category).await,
        Command::Delete { id } => commands::delete(&config, &id).await,
        Command::Stats { json } => commands::stats(&config, json).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_publish_category() {
        let cli = Cli::parse_from(["medpulse", "publish", "--pmid", "123", "--category", "mental-health"]);
        match cli.command {
            Some(Command::Publish { pmid, category }) => {
                assert_eq!(pmid, "123");
                assert_eq!(category, Category::MentalHealth);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["medpulse", "publish", "--pmid", "1", "--category", "astrology"]).is_err());
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::parse_from(["medpulse"]);
        assert!(cli.command.is_none());
    }
}
