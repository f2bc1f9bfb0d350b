use anyhow::{Context, Result};
use std::{env, net::SocketAddr, path::PathBuf};

use crate::tree::TreeParams;

pub const DEFAULT_MODEL_PATH: &str = "flight_delay_model.json";
pub const DEFAULT_DATA_PATH: &str = "Flight_delay.csv";

/// Settings for `serve`, read from the environment (and `.env` if present).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub model_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// `LOG_PRED=1`: one debug line per prediction.
    pub log_predictions: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid PORT value {raw:?}"))?,
            Err(_) => 5000,
        };

        Ok(Self {
            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH)),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            log_predictions: env::var("LOG_PRED").ok().as_deref() == Some("1"),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_predictions: false,
        }
    }
}

/// Settings for `train`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    /// Fraction of rows held out for the accuracy estimate.
    pub test_size: f64,
    pub split_seed: u64,
    pub tree: TreeParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            output_path: PathBuf::from(DEFAULT_MODEL_PATH),
            test_size: 0.3,
            split_seed: 0,
            tree: TreeParams::default(),
        }
    }
}
