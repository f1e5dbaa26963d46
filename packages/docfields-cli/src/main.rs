//! Command-line front end for docfields.
//!
//! Plans field sets and inspects persisted extraction output.

mod plan;
mod settings;
mod show;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

#[derive(Parser)]
#[command(name = "docfields")]
#[command(about = "Plan and inspect document field extraction runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a field set and print its processing order
    Plan {
        /// JSON array of field specs
        #[arg(long)]
        fields: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Pages retrieved per field (overrides DOCFIELDS_TOP_K)
        #[arg(long)]
        top_k: Option<usize>,

        /// Separator between search phrases (overrides DOCFIELDS_QUERY_SEPARATOR)
        #[arg(long)]
        query_separator: Option<String>,
    },

    /// Print the flat view of a saved extraction output
    Show {
        /// Output document written by `ExtractionRun::write_output`
        #[arg(long)]
        output: PathBuf,

        /// Only print this field
        #[arg(long)]
        field: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,docfields=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            fields,
            json,
            top_k,
            query_separator,
        } => {
            let settings = Settings::from_env()?.with_overrides(top_k, query_separator);
            let specs = plan::read_fields(&fields)?;
            let planned = plan::build_plan(&specs, &settings.extraction_config())?;
            tracing::info!(fields = planned.len(), top_k = settings.top_k, "Planned field set");

            if json {
                let out = serde_json::to_string_pretty(&planned).context("Failed to encode plan")?;
                println!("{}", out);
            } else {
                print!("{}", plan::render_plan(&planned));
            }
        }
        Commands::Show { output, field } => {
            let document = show::read_output(&output)?;
            print!("{}", show::render_output(&document, field.as_deref())?);
        }
    }

    Ok(())
}
