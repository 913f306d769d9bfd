//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for twquant.
#[derive(Debug, thiserror::Error)]
pub enum QuantError {
    /// Network or service failure. Retried inside the range fetcher before
    /// it ever reaches a caller.
    #[error("transient failure from {source_name}: {reason}")]
    TransientSource { source_name: String, reason: String },

    /// Payload arrived but the source rejected the query. Never retried.
    #[error("invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },

    #[error("no bars for {instrument} between {start} and {end}")]
    EmptyResult {
        instrument: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("all sources failed for {instrument}: {cause}")]
    SourceExhausted {
        instrument: String,
        #[source]
        cause: Box<QuantError>,
    },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuantError {
    /// Whether the fetcher's retry loop should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, QuantError::TransientSource { .. })
    }
}

impl From<&QuantError> for std::process::ExitCode {
    fn from(err: &QuantError) -> Self {
        let code: u8 = match err {
            QuantError::Io(_) => 1,
            QuantError::ConfigParse { .. }
            | QuantError::ConfigMissing { .. }
            | QuantError::ConfigInvalid { .. } => 2,
            QuantError::TransientSource { .. }
            | QuantError::InvalidResponse { .. }
            | QuantError::SourceExhausted { .. } => 3,
            QuantError::Cache { .. } => 4,
            QuantError::EmptyResult { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
