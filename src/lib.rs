#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Column naming for flattened contribution maps.
pub mod codec;
/// Pipeline configuration types.
pub mod config;
/// Centralized constants used across codec, selector and prompts.
pub mod constants;
/// Records, flattened rows and finished prompt types.
pub mod data;
mod hash;
/// Display indices for sampled contributors.
pub mod index;
/// Selection tallies per stage batch.
pub mod metrics;
/// Batch-wide schema normalization.
pub mod normalize;
/// Per-stage batch driver.
pub mod pipeline;
/// Prompt text rendering.
pub mod prompt;
/// Reward-ranked and random contribution sampling.
pub mod selector;
/// Transcript sinks for rendered contributions.
pub mod transcript;
/// Shared type aliases.
pub mod types;
/// Text extraction helpers.
pub mod utils;

mod errors;

pub use codec::ColumnCodec;
pub use config::{
    PersonaRole, PersonaSetting, PipelineConfig, PromptStyle, RewardOrder, SelectionMethod,
};
pub use data::{
    ChatMessage, ChatRole, ContributionField, ContributionMap, FlatBatch, FlatColumn, FlatRecord,
    Record, Stage, StagePrompt, records_from_json,
};
pub use errors::PipelineError;
pub use index::CanonicalIndex;
pub use metrics::SelectionStats;
pub use normalize::{NormalizeReport, normalize_batch, union_keys};
pub use pipeline::{BatchOutcome, PromptPipeline, SkippedRecord};
pub use prompt::PromptAssembler;
pub use selector::{
    ContributionSelector, RewardScorer, ScoringRequest, SelectedColumn, SelectionResult,
};
pub use transcript::{
    FileTranscript, MemoryTranscript, NullTranscript, TranscriptEntry, TranscriptSink,
    start_session,
};
pub use types::{
    ColumnName, ContributionText, ContributorId, PromptText, QuestionText, RewardValue,
    SkipReason, TieBreaker,
};
