//! Flight delay classifier.
//!
//! `trainer` fits a decision tree on historical flights and writes a single
//! artifact; `server` loads that artifact once and answers `/predict`
//! requests. Both go through [`features::FeatureSchema::align`] so the
//! vectors seen at serving time have the training column set and order.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod model;
pub mod scaler;
pub mod server;
pub mod trainer;
pub mod tree;
pub mod types;

pub use features::FeatureSchema;
pub use model::{Model, TrainedArtifact};
pub use types::{PredictionOut, PredictionRequest};
