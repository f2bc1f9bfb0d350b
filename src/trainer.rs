use std::collections::BTreeSet;

use anyhow::{Context, Result};
use ndarray::{Array2, ArrayView1, Axis};
use tracing::{info, warn};

use crate::config::TrainConfig;
use crate::dataset::{self, delay_label};
use crate::error::DatasetError;
use crate::features::FeatureSchema;
use crate::model::{ModelInfo, TrainedArtifact};
use crate::scaler::MinMaxScaler;
use crate::tree::DecisionTree;
use crate::types::FlightRecord;

/// Rows needed so both sides of the split are non-empty.
const MIN_RECORDS: usize = 2;

fn sorted_distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Align the given records straight into a matrix, one row per index.
fn aligned_matrix(schema: &FeatureSchema, records: &[FlightRecord], rows: &[usize]) -> Array2<f32> {
    let mut x = Array2::<f32>::zeros((rows.len(), schema.len()));
    for (mut out, &i) in x.axis_iter_mut(Axis(0)).zip(rows) {
        let aligned = schema.align(&records[i].row());
        if !aligned.dropped.is_empty() {
            // Every training value is in the schema by construction.
            warn!(dropped = ?aligned.dropped, "training row produced unknown columns");
        }
        out.assign(&ArrayView1::from(aligned.values.as_slice()));
    }
    x
}

/// Fit schema, scaler and tree on in-memory records.
pub fn train(records: &[FlightRecord], cfg: &TrainConfig) -> Result<TrainedArtifact> {
    if records.len() < MIN_RECORDS {
        return Err(DatasetError::TooSmall {
            found: records.len(),
            needed: MIN_RECORDS,
        }
        .into());
    }

    let labels: Vec<u8> = records.iter().map(|r| delay_label(&r.delays)).collect();

    let airlines = sorted_distinct(records.iter().map(|r| r.airline.as_str()));
    let origins = sorted_distinct(records.iter().map(|r| r.origin.as_str()));
    let destinations = sorted_distinct(records.iter().map(|r| r.dest.as_str()));
    info!(
        airlines = airlines.len(),
        origins = origins.len(),
        destinations = destinations.len(),
        "distinct categorical values"
    );

    let schema = FeatureSchema::fit(records.iter().map(FlightRecord::row));
    info!(features = schema.len(), "feature schema fitted");

    let (train_idx, test_idx) =
        dataset::train_test_split(records.len(), cfg.test_size, cfg.split_seed);
    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(DatasetError::TooSmall {
            found: records.len(),
            needed: MIN_RECORDS,
        })
        .context(format!("test_size {} leaves one side of the split empty", cfg.test_size));
    }
    info!(train = train_idx.len(), test = test_idx.len(), "split dataset");

    let mut x_train = aligned_matrix(&schema, records, &train_idx);
    let mut x_test = aligned_matrix(&schema, records, &test_idx);
    let y_train: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<u8> = test_idx.iter().map(|&i| labels[i]).collect();

    let scaler = MinMaxScaler::fit(x_train.view());
    for row in x_train.axis_iter_mut(Axis(0)) {
        scaler.transform_view(row);
    }
    for row in x_test.axis_iter_mut(Axis(0)) {
        scaler.transform_view(row);
    }

    info!(max_depth = cfg.tree.max_depth, seed = cfg.tree.seed, "training decision tree");
    let model = DecisionTree::fit(x_train.view(), &y_train, cfg.tree);
    let fitted = model.params();
    info!(
        max_depth = fitted.max_depth,
        min_samples_split = fitted.min_samples_split,
        nodes = model.node_count(),
        leaves = model.leaf_count(),
        depth = model.depth(),
        "tree fitted"
    );

    let predicted = model.predict_rows(x_test.view());
    let correct = predicted.iter().zip(&y_test).filter(|(p, y)| p == y).count();
    let accuracy = correct as f64 / y_test.len() as f64;
    info!(accuracy, "held-out accuracy");

    Ok(TrainedArtifact {
        model,
        scaler,
        feature_columns: schema,
        model_info: ModelInfo {
            accuracy,
            airlines,
            origins,
            destinations,
            year: dataset::dominant_year(records),
        },
    })
}

/// Full offline run: read the CSV, train, write the artifact.
pub fn run(cfg: &TrainConfig) -> Result<TrainedArtifact> {
    info!(path = %cfg.data_path.display(), "loading dataset");
    let records = dataset::load_records(&cfg.data_path)
        .with_context(|| format!("failed to read dataset {}", cfg.data_path.display()))?;
    let summary = dataset::DatasetSummary::from_records(&records);
    info!(
        total = summary.total,
        delayed = summary.delayed,
        on_time = summary.on_time,
        "dataset loaded"
    );

    let artifact = train(&records, cfg)?;

    artifact
        .save(&cfg.output_path)
        .with_context(|| format!("failed to write artifact {}", cfg.output_path.display()))?;
    info!(path = %cfg.output_path.display(), "model artifact saved");
    Ok(artifact)
}
