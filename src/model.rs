use std::{fs, io::Write, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;
use crate::features::{AlignedRow, FeatureSchema};
use crate::scaler::MinMaxScaler;
use crate::tree::{Classifier, DecisionTree};
use crate::types::{FlightRow, PredictionOut};

/// Descriptive metadata shown by `/` and `/info`. Never used for validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Held-out accuracy as a fraction.
    pub accuracy: f64,
    pub airlines: Vec<String>,
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub year: Option<i32>,
}

/// Everything the predictor needs, written once by the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub model: DecisionTree,
    pub scaler: MinMaxScaler,
    pub feature_columns: FeatureSchema,
    pub model_info: ModelInfo,
}

impl TrainedArtifact {
    /// Schema, scaler and classifier must agree on the input width.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let expected = self.feature_columns.len();
        let widths = [
            ("scaler", self.scaler.n_features()),
            ("classifier", self.model.n_features()),
        ];
        for (component, got) in widths {
            if got != expected {
                return Err(ArtifactError::WidthMismatch {
                    component,
                    got,
                    expected,
                });
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let mut out = std::io::BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let file = fs::File::open(path)?;
        let artifact: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        artifact.validate()?;
        Ok(artifact)
    }
}

/// One scored row: the aligned + scaled vector that reached the classifier,
/// and what the classifier said about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub features: AlignedRow,
    pub class: u8,
    pub proba: [f64; 2],
}

impl Scored {
    pub fn output(&self) -> PredictionOut {
        PredictionOut::from_proba(self.class, self.proba)
    }
}

/// Read-only serving model: align → scale → classify.
#[derive(Debug, Clone)]
pub struct Model {
    artifact: TrainedArtifact,
}

impl Model {
    pub fn new(artifact: TrainedArtifact) -> Result<Self> {
        artifact
            .validate()
            .context("refusing to serve an inconsistent artifact")?;
        Ok(Self { artifact })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact = TrainedArtifact::load(path)
            .with_context(|| format!("failed to load model artifact {}", path.display()))?;
        Self::new(artifact)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.artifact.feature_columns
    }

    pub fn info(&self) -> &ModelInfo {
        &self.artifact.model_info
    }

    /// Align and scale a raw row exactly as during training.
    pub fn features(&self, row: &FlightRow<'_>) -> AlignedRow {
        let mut aligned = self.artifact.feature_columns.align(row);
        self.artifact.scaler.transform_row(&mut aligned.values);
        aligned
    }

    pub fn score(&self, row: &FlightRow<'_>) -> Result<Scored> {
        let features = self.features(row);
        let in_dim = self.artifact.model.n_features();
        if features.values.len() != in_dim {
            bail!(
                "feature length mismatch: got {}, expected {}",
                features.values.len(),
                in_dim
            );
        }
        let proba = self.artifact.model.predict_proba(&features.values);
        if proba.iter().any(|p| !p.is_finite()) {
            bail!("classifier returned non-finite probabilities {proba:?}");
        }
        let class = self.artifact.model.predict(&features.values);
        Ok(Scored {
            features,
            class,
            proba,
        })
    }
}
