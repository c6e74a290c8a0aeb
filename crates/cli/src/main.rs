//! Property Price Estimator CLI
//!
//! Queries and feeds a running estimator service, and trains artifacts
//! offline from a CSV file.

mod client;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{model, predict, retrain, train, zones};
use estimator_lib::regressor::Algorithm;
use estimator_lib::FeatureSchema;

/// Property Price Estimator CLI
#[derive(Parser)]
#[command(name = "estimator")]
#[command(author, version, about = "CLI for the Property Price Estimator", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via ESTIMATOR_API_URL env var)
    #[arg(long, env = "ESTIMATOR_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the config file, then table)
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate the price of a property
    Predict {
        /// Zone name, e.g. Chamberí
        #[arg(long)]
        zona: String,

        /// Number of rooms
        #[arg(long)]
        habitaciones: u32,

        /// Number of bathrooms
        #[arg(long)]
        banos: u32,

        /// Property type (full schema only)
        #[arg(long)]
        tipovivienda: Option<String>,

        /// Floor area in square meters (full schema only)
        #[arg(long)]
        metros: Option<u32>,
    },

    /// Retrain the served model on new rows
    Retrain {
        /// CSV or JSON dataset file
        #[arg(long, conflicts_with = "record", required_unless_present = "record")]
        file: Option<PathBuf>,

        /// Single JSON record, e.g. '{"zona":"Centro",...,"precio":250000}'
        #[arg(long)]
        record: Option<String>,
    },

    /// Replace the served model with an artifact file
    UploadModel {
        /// Artifact file produced by `train`
        path: PathBuf,
    },

    /// Show the served model
    Status,

    /// Train an artifact offline from a CSV file
    Train {
        /// Training CSV with a header row
        #[arg(long)]
        data: PathBuf,

        /// Where to write the artifact
        #[arg(long, short)]
        output: PathBuf,

        /// Feature schema (basic, full)
        #[arg(long, default_value = "full", value_parser = parse_schema)]
        schema: FeatureSchema,

        /// Fitting algorithm (linear, mean)
        #[arg(long, default_value = "linear", value_parser = parse_algorithm)]
        algorithm: Algorithm,

        /// Seed for the holdout split
        #[arg(long, default_value_t = estimator_lib::training::DEFAULT_SPLIT_SEED)]
        seed: u64,
    },

    /// List the distinct zone names in a dataset or map file
    Zones {
        /// Training CSV (zona, habitaciones, banos, precio)
        #[arg(long, conflicts_with = "geojson", required_unless_present = "geojson")]
        data: Option<PathBuf>,

        /// GeoJSON file whose features carry properties.NOMBRE
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
}

fn parse_schema(value: &str) -> Result<FeatureSchema, String> {
    match value.to_lowercase().as_str() {
        "basic" => Ok(FeatureSchema::Basic),
        "full" => Ok(FeatureSchema::Full),
        other => Err(format!("unknown schema '{}' (expected basic or full)", other)),
    }
}

fn parse_algorithm(value: &str) -> Result<Algorithm, String> {
    match value.to_lowercase().as_str() {
        "linear" => Ok(Algorithm::Linear),
        "mean" => Ok(Algorithm::Mean),
        other => Err(format!("unknown algorithm '{}' (expected linear or mean)", other)),
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::Config::load()?;
    let format = cli
        .format
        .or_else(|| settings.default_format.as_deref().and_then(output::OutputFormat::from_name))
        .unwrap_or_default();

    let api_url = settings.resolve_api_url(cli.api_url.as_deref());
    let connect = || client::ApiClient::new(&api_url);

    match cli.command {
        Commands::Predict {
            zona,
            habitaciones,
            banos,
            tipovivienda,
            metros,
        } => {
            let request = predict::PredictArgs {
                zona,
                habitaciones,
                banos,
                tipovivienda,
                metros,
            };
            predict::predict(&connect()?, &request, format).await?;
        }
        Commands::Retrain { file, record } => {
            retrain::retrain(&connect()?, file.as_deref(), record.as_deref(), format).await?;
        }
        Commands::UploadModel { path } => {
            model::upload_model(&connect()?, &path, format).await?;
        }
        Commands::Status => {
            model::show_status(&connect()?, format).await?;
        }
        // Offline, never touches the service
        Commands::Train {
            data,
            output,
            schema,
            algorithm,
            seed,
        } => {
            train::train_offline(&data, &output, schema, algorithm, seed, format)?;
        }
        Commands::Zones { data, geojson } => {
            zones::list_zones(data.as_deref(), geojson.as_deref(), format)?;
        }
    }

    Ok(())
}
