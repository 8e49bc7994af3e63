//! Error taxonomy shared across the core.
//!
//! Lower layers (schema, encoder, trainer, store) surface every anomaly with
//! the column and value that caused it. The inference service folds them into
//! the few kinds a caller sees, keeping the underlying error as `source`.

use thiserror::Error;

/// Stable error codes that cross the FFI boundary.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// The submitted record failed schema validation.
    InvalidInput = 1,
    /// No artifact is loaded, predictions are refused.
    ServiceUnavailable = 2,
    /// The requested artifact is missing or corrupt.
    ArtifactUnavailable = 3,
    /// A training run was rejected.
    Training = 4,
    /// Catch-all for bugs and misuse of the ABI.
    Internal = 5,
}

/// Failures while deriving or querying a [`Schema`](crate::features::Schema).
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("column `{column}` is declared numeric but holds non-numeric value `{value}`")]
    AmbiguousType { column: String, value: String },

    #[error("categorical column `{column}` has {distinct} distinct value(s), at least 2 required")]
    EmptyVocabulary { column: String, distinct: usize },

    #[error("category `{value}` is not in the vocabulary of column `{column}`")]
    UnknownCategory { column: String, value: String },

    #[error("column `{0}` is not present in the dataset")]
    MissingColumn(String),

    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),
}

/// Failures while encoding a single record.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EncodingError {
    #[error("record has no value for column `{0}`")]
    MissingField(String),

    #[error("column `{column}` rejects value `{value}`: {reason}")]
    InvalidValue {
        column: String,
        value: String,
        reason: &'static str,
    },

    #[error("category `{value}` is not in the vocabulary of column `{column}`")]
    UnknownCategory { column: String, value: String },
}

/// Failures of a training run.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("row {row_index} rejected: {cause}")]
    TrainingDataRejected {
        row_index: usize,
        #[source]
        cause: EncodingError,
    },

    #[error("classifier fit failed: {0}")]
    Fit(String),

    #[error("could not persist artifact")]
    Store(#[from] StoreError),
}

/// Failures of the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact io failure")]
    Io(#[from] std::io::Error),

    #[error("artifact {0} not found")]
    NotFound(String),

    #[error("artifact v{0} already exists")]
    AlreadyExists(u64),

    #[error("artifact is corrupt: {0}")]
    Corrupt(String),

    #[error("artifact could not be encoded")]
    Encode(#[from] serde_json::Error),
}

/// The only errors a caller of the inference service has to understand.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("artifact unavailable")]
    ArtifactUnavailable(#[source] StoreError),

    #[error("service unavailable: no artifact loaded")]
    ServiceUnavailable,

    #[error("invalid input")]
    InvalidInput(#[source] EncodingError),
}

impl ServiceError {
    /// Numeric code reported across the FFI boundary.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::ArtifactUnavailable(_) => ErrorCode::ArtifactUnavailable,
            ServiceError::ServiceUnavailable => ErrorCode::ServiceUnavailable,
            ServiceError::InvalidInput(_) => ErrorCode::InvalidInput,
        }
    }

    /// Column named by an `InvalidInput` rejection, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ServiceError::InvalidInput(cause) => Some(cause.column()),
            _ => None,
        }
    }
}

impl TrainingError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Training
    }
}

impl EncodingError {
    /// Column the failure refers to.
    pub fn column(&self) -> &str {
        match self {
            EncodingError::MissingField(column)
            | EncodingError::InvalidValue { column, .. }
            | EncodingError::UnknownCategory { column, .. } => column,
        }
    }
}
