//! Per-stage batch driver.
//!
//! Each stage runs normalize → flatten → select → index → assemble. Only the
//! normalization pass needs the whole batch; every record is selected and
//! rendered independently, and a record whose selection fails is skipped
//! (or aborts the batch when `fail_fast` is set).

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::codec::ColumnCodec;
use crate::config::{PersonaRole, PipelineConfig};
use crate::data::{ContributionField, FlatRecord, Record, Stage, StagePrompt};
use crate::errors::PipelineError;
use crate::index::CanonicalIndex;
use crate::metrics::SelectionStats;
use crate::normalize::{NormalizeReport, normalize_batch};
use crate::prompt::{PromptAssembler, chat_messages, system_prompt};
use crate::selector::{ContributionSelector, RewardScorer, SelectionResult};
use crate::transcript::{NullTranscript, TranscriptSink};
use crate::types::{ColumnName, PromptText, QuestionText, SkipReason};
use crate::utils::extract_hash_answer;

/// A record left out of a batch, with the reason it failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Position of the record in the input batch.
    pub position: usize,
    /// Question of the skipped record.
    pub question: QuestionText,
    /// Rendered error that caused the skip.
    pub reason: SkipReason,
}

/// Prompts built for one stage plus the records that had to be skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome {
    /// Stage the prompts feed.
    pub stage: Stage,
    /// One prompt per record that rendered, in input order.
    pub prompts: Vec<StagePrompt>,
    /// Records left out, in input order.
    pub skipped: Vec<SkippedRecord>,
    /// Sentinel backfill performed before selection.
    pub normalization: NormalizeReport,
    /// Selection tallies for this stage's candidate field.
    pub stats: SelectionStats,
}

/// Contribution column unions of one flattened batch.
struct BatchColumns<'b> {
    answers: Vec<&'b ColumnName>,
    opinions: Vec<&'b ColumnName>,
}

/// One record's sampled contributions.
struct Sampled {
    index: CanonicalIndex,
    selection: SelectionResult,
    candidates: usize,
}

/// Builds stage prompts for batches of records.
pub struct PromptPipeline<S> {
    config: PipelineConfig,
    codec: ColumnCodec,
    selector: ContributionSelector,
    scorer: S,
    transcript: Arc<dyn TranscriptSink>,
}

impl<S: RewardScorer> PromptPipeline<S> {
    /// Create a pipeline scoring candidates with `scorer`.
    pub fn new(config: PipelineConfig, scorer: S) -> Result<Self, PipelineError> {
        let config = config.validated()?;
        let selector = ContributionSelector::from_config(&config);
        Ok(Self {
            config,
            codec: ColumnCodec::default(),
            selector,
            scorer,
            transcript: Arc::new(NullTranscript),
        })
    }

    /// Route rendered contributions to `sink`.
    pub fn with_transcript(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.transcript = sink;
        self
    }

    /// Validated configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Codec used to flatten records.
    pub fn codec(&self) -> &ColumnCodec {
        &self.codec
    }

    /// Stage-1 prompts: the stage instruction and the bare question.
    pub fn stage1_prompts(&self, records: &[Record]) -> Vec<StagePrompt> {
        let system = system_prompt(Stage::Answer, self.persona());
        records
            .iter()
            .map(|record| StagePrompt {
                stage: Stage::Answer,
                question: record.question.clone(),
                answer: record.answer.as_deref().and_then(extract_hash_answer),
                messages: chat_messages(system.clone(), record.question.clone()),
                selected: Vec::new(),
            })
            .collect()
    }

    /// Stage-2 prompts: the question plus a sample of stage-1 answers.
    pub fn stage2_prompts(&self, records: Vec<Record>) -> Result<BatchOutcome, PipelineError> {
        self.run(Stage::Compare, records, |row, columns, assembler| {
            self.compare(row, &columns.answers, assembler)
        })
    }

    /// Stage-3 prompts: the stage-2 transcript plus a sample of critiques.
    pub fn stage3_prompts(&self, records: Vec<Record>) -> Result<BatchOutcome, PipelineError> {
        self.run(Stage::Synthesis, records, |row, columns, assembler| {
            self.synthesize(row, columns, assembler)
        })
    }

    fn run<F>(
        &self,
        stage: Stage,
        mut records: Vec<Record>,
        render: F,
    ) -> Result<BatchOutcome, PipelineError>
    where
        F: Fn(
            &FlatRecord,
            &BatchColumns<'_>,
            &PromptAssembler<'_>,
        ) -> Result<(PromptText, Sampled), PipelineError>,
    {
        let normalization =
            normalize_batch(&mut records, stage.normalized_fields(), &self.config.sentinel);
        let batch = self.codec.flatten_batch(&records);
        let columns = BatchColumns {
            answers: self
                .codec
                .columns_for(batch.columns(), ContributionField::Answers),
            opinions: self
                .codec
                .columns_for(batch.columns(), ContributionField::Opinions),
        };
        let assembler =
            PromptAssembler::new(&self.codec, &self.config.style, self.transcript.as_ref());
        let system = system_prompt(stage, self.persona());

        let mut prompts = Vec::with_capacity(batch.len());
        let mut skipped = Vec::new();
        let mut stats = SelectionStats::default();
        for (position, row) in batch.rows().iter().enumerate() {
            match render(row, &columns, &assembler) {
                Ok((user, sampled)) => {
                    stats.observe(
                        row,
                        sampled.candidates,
                        &sampled.selection,
                        sampled.index.contributors(),
                        &self.config.sentinel,
                    );
                    prompts.push(StagePrompt {
                        stage,
                        question: row.question.clone(),
                        answer: row.answer.clone(),
                        messages: chat_messages(system.clone(), user),
                        selected: sampled.index.contributors().to_vec(),
                    });
                }
                Err(err) => {
                    if self.config.fail_fast {
                        return Err(err);
                    }
                    warn!(
                        stage = %stage,
                        position,
                        error = %err,
                        "[swarm_prompts:pipeline] skipping record"
                    );
                    skipped.push(SkippedRecord {
                        position,
                        question: row.question.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            stage = %stage,
            prompts = prompts.len(),
            skipped = skipped.len(),
            backfilled = normalization.total_backfilled(),
            sentinel_selected = stats.sentinel_selected,
            tiebreak_rows = stats.tiebreak_rows,
            "[swarm_prompts:pipeline] built stage prompts"
        );
        Ok(BatchOutcome {
            stage,
            prompts,
            skipped,
            normalization,
            stats,
        })
    }

    fn compare(
        &self,
        row: &FlatRecord,
        answer_columns: &[&ColumnName],
        assembler: &PromptAssembler<'_>,
    ) -> Result<(PromptText, Sampled), PipelineError> {
        let sampled = self.sample(row, ContributionField::Answers, answer_columns, Stage::Compare)?;
        Ok((assembler.render_stage2(row, &sampled.index), sampled))
    }

    fn synthesize(
        &self,
        row: &FlatRecord,
        columns: &BatchColumns<'_>,
        assembler: &PromptAssembler<'_>,
    ) -> Result<(PromptText, Sampled), PipelineError> {
        let stage2_prompt = match &row.stage2_prompt {
            Some(prompt) => prompt.clone(),
            None if !self.has_field(row, ContributionField::Answers) => {
                return Err(PipelineError::MissingField {
                    field: ContributionField::Answers.name().to_string(),
                });
            }
            None => self.compare(row, &columns.answers, assembler)?.0,
        };
        let sampled = self.sample(
            row,
            ContributionField::Opinions,
            &columns.opinions,
            Stage::Synthesis,
        )?;
        Ok((
            assembler.render_stage3(&stage2_prompt, row, &sampled.index),
            sampled,
        ))
    }

    fn sample(
        &self,
        row: &FlatRecord,
        field: ContributionField,
        batch_columns: &[&ColumnName],
        stage: Stage,
    ) -> Result<Sampled, PipelineError> {
        // Rows that never carried the field have no candidates of their own.
        let candidates: Vec<&str> = batch_columns
            .iter()
            .map(|column| column.as_str())
            .filter(|column| row.columns.contains_key(*column))
            .collect();
        let selection = self
            .selector
            .select(row, field, &candidates, stage, &self.scorer)?;
        Ok(Sampled {
            index: CanonicalIndex::from_selection(&self.codec, &selection),
            selection,
            candidates: candidates.len(),
        })
    }

    fn has_field(&self, row: &FlatRecord, field: ContributionField) -> bool {
        row.column_names()
            .any(|column| self.codec.decode_in(field, column).is_some())
    }

    fn persona(&self) -> Option<PersonaRole> {
        match self.config.seed {
            Some(seed) => self.config.persona.resolve(&mut StdRng::seed_from_u64(seed)),
            None => self.config.persona.resolve(&mut rand::rng()),
        }
    }
}
