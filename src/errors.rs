use std::io;

use thiserror::Error;

use crate::data::Stage;
use crate::types::ColumnName;

/// Error type for configuration, codec, scorer, and transcript failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Settings rejected by validation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Two field prefixes could decode the same column.
    #[error("contribution fields '{first}' and '{second}' have overlapping column prefixes")]
    PrefixCollision { first: String, second: String },
    /// A scalar column name starts with a field prefix.
    #[error("reserved column '{column}' would decode as a '{field}' contribution")]
    ReservedColumn { column: String, field: String },
    /// A candidate column is absent from the record.
    #[error("record has no column '{column}'")]
    MissingColumn { column: ColumnName },
    /// A record lacks a field needed to build its prompt.
    #[error("record has no '{field}' field")]
    MissingField { field: String },
    /// The external scorer reported a failure.
    #[error("reward scorer failed for stage {stage}: {reason}")]
    ScorerFailed { stage: Stage, reason: String },
    /// The scorer returned a different number of rewards than requests.
    #[error("reward scorer for stage {stage} returned {got} rewards for {expected} candidates")]
    RewardCountMismatch {
        stage: Stage,
        expected: usize,
        got: usize,
    },
    /// The scorer returned NaN for a candidate.
    #[error("reward for column '{column}' is not a number")]
    NonNumericReward { column: ColumnName },
    /// A JSON snapshot could not be parsed.
    #[error("contribution snapshot is malformed: {details}")]
    Snapshot { details: String },
    /// Transcript file I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// True when the failure came from the external reward scorer.
    pub fn is_scorer_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::ScorerFailed { .. }
                | PipelineError::RewardCountMismatch { .. }
                | PipelineError::NonNumericReward { .. }
        )
    }
}
