use thiserror::Error;

/// Failures while reading the historical flight CSV.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unparseable date {value:?} on data row {row}")]
    InvalidDate { row: usize, value: String },

    #[error("Dataset has {found} usable rows, need at least {needed}")]
    TooSmall { found: usize, needed: usize },
}

/// Failures while saving, loading or sanity-checking a trained artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact is inconsistent: {component} expects {got} features, schema has {expected}")]
    WidthMismatch {
        component: &'static str,
        got: usize,
        expected: usize,
    },
}

/// Rejections of a prediction request, raised before any feature vector is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Month must be between 1-12")]
    MonthOutOfRange,

    #[error("Day must be between 1-31")]
    DayOutOfRange,

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl RequestError {
    /// Whether the caller is at fault (HTTP 400) as opposed to an unexpected failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RequestError::InvalidField { .. })
    }

    pub fn invalid<S: Into<String>>(field: &'static str, reason: S) -> Self {
        RequestError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
