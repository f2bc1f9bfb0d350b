use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use delay_predictor::config::{ServerConfig, TrainConfig, DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH};
use delay_predictor::dataset::{self, DatasetSummary};
use delay_predictor::model::Model;
use delay_predictor::tree::TreeParams;
use delay_predictor::types::{DelayLabel, PredictionRequest};
use delay_predictor::{server, trainer};

#[derive(Parser, Debug)]
#[command(name = "delay_predictor", version, about = "Flight delay classifier: offline trainer and HTTP predictor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit the classifier on historical flights and write the model artifact.
    Train(TrainArgs),
    /// Serve predictions over HTTP from a trained artifact.
    Serve {
        /// Overrides MODEL_PATH.
        #[arg(long)]
        model: Option<PathBuf>,
        /// Overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the delay-label distribution of a dataset.
    Inspect {
        #[arg(long, default_value = DEFAULT_DATA_PATH)]
        data: PathBuf,
    },
    /// Score sample flights against an artifact without starting the server.
    Check {
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
        /// A `/predict` JSON body; defaults to the two built-in sample flights.
        #[arg(long)]
        request: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    output: PathBuf,
    #[arg(long, default_value_t = 20)]
    max_depth: usize,
    #[arg(long, default_value_t = 2)]
    min_samples_split: usize,
    #[arg(long, default_value_t = 0.3)]
    test_size: f64,
    #[arg(long, default_value_t = 0)]
    split_seed: u64,
    #[arg(long, default_value_t = 1)]
    tree_seed: u64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path: a.data,
            output_path: a.output,
            test_size: a.test_size,
            split_seed: a.split_seed,
            tree: TreeParams {
                max_depth: a.max_depth,
                min_samples_split: a.min_samples_split,
                seed: a.tree_seed,
            },
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Train(args) => {
            let cfg = TrainConfig::from(args);
            if !(cfg.test_size > 0.0 && cfg.test_size < 1.0) {
                anyhow::bail!("--test-size must be in (0, 1), got {}", cfg.test_size);
            }
            let artifact = tokio::task::spawn_blocking(move || trainer::run(&cfg))
                .await
                .context("training task panicked")??;
            println!("{}", "=".repeat(50));
            println!(
                "Model accuracy: {:.4} ({:.2}%)",
                artifact.model_info.accuracy,
                artifact.model_info.accuracy * 100.0
            );
            println!("Total features: {}", artifact.feature_columns.len());
            println!("{}", "=".repeat(50));
        }
        Commands::Serve { model, port } => {
            let mut cfg = ServerConfig::from_env()?;
            if let Some(model) = model {
                cfg.model_path = model;
            }
            if let Some(port) = port {
                cfg.port = port;
            }
            server::serve(cfg).await?;
        }
        Commands::Inspect { data } => {
            let records = dataset::load_records(&data)
                .with_context(|| format!("failed to read dataset {}", data.display()))?;
            print_summary(&DatasetSummary::from_records(&records));
        }
        Commands::Check { model, request } => {
            let model = Model::load(&model)?;
            let bodies = match request {
                Some(raw) => vec![serde_json::from_str(&raw).context("--request is not valid JSON")?],
                None => sample_requests(),
            };
            for body in bodies {
                let req = PredictionRequest::from_json(&body)?;
                let scored = model.score(&req.row())?;
                println!("{}", "=".repeat(50));
                println!(
                    "{} {} -> {}, {:04} -> {:04}, {:02}/{:02} (day {})",
                    req.airline,
                    req.origin_airport,
                    req.dest_airport,
                    req.departure_time,
                    req.arrival_time,
                    req.month,
                    req.day,
                    req.day_of_week
                );
                if !scored.features.dropped.is_empty() {
                    println!("Unseen categories (treated as absent): {:?}", scored.features.dropped);
                }
                println!("Encoded features: {} (expected {})", scored.features.values.len(), model.schema().len());
                println!("Probability on-time (0): {:.4}", scored.proba[0]);
                println!("Probability delayed (1): {:.4}", scored.proba[1]);
                let label = match DelayLabel::from_class(scored.class) {
                    DelayLabel::Delayed => "DELAYED",
                    DelayLabel::OnTime => "ON-TIME",
                };
                println!("Final: {label}");
            }
            println!("{}", "=".repeat(50));
        }
    }
    Ok(())
}

fn print_summary(s: &DatasetSummary) {
    println!("{}", "=".repeat(50));
    println!("DATASET ANALYSIS");
    println!("{}", "=".repeat(50));
    println!("Total flights: {}", s.total);
    println!("Delayed (1): {}", s.delayed);
    println!("On-time (0): {}", s.on_time);
    println!("Delay rate: {:.2}%", s.delay_rate);
    println!("{}", "=".repeat(50));
}

fn sample_requests() -> Vec<serde_json::Value> {
    vec![
        json!({
            "dayOfWeek": 5, "month": 12, "day": 15,
            "departureTime": 1830, "arrivalTime": 2100,
            "airline": "American Eagle Airlines Inc.",
            "originAirport": "ORD", "destAirport": "EWR"
        }),
        json!({
            "dayOfWeek": 2, "month": 3, "day": 10,
            "departureTime": 1000, "arrivalTime": 1200,
            "airline": "Southwest Airlines Co.",
            "originAirport": "LAX", "destAirport": "SFO"
        }),
    ]
}
