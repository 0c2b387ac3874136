use indexmap::IndexSet;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::codec::ColumnCodec;
use crate::config::{PipelineConfig, RewardOrder, SelectionMethod};
use crate::constants::selection::RANDOM_SEED_OFFSET;
use crate::data::{ContributionField, FlatRecord, Stage};
use crate::errors::PipelineError;
use crate::hash::{column_tiebreaker, record_seed};
use crate::types::{ColumnName, ContributorId, RewardValue, TieBreaker};

/// One candidate handed to the reward scorer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoringRequest<'a> {
    /// Question the candidate responds to.
    pub question: &'a str,
    /// Candidate text.
    pub completion: &'a str,
    /// Ground-truth answer, when the record carries one.
    pub answer: Option<&'a str>,
}

/// External reward-scoring capability.
///
/// Implementations return exactly one reward per request, in request order.
/// A failure must be reported as an error rather than a default reward.
pub trait RewardScorer: Send + Sync {
    /// Score every request for `stage`.
    fn score(
        &self,
        stage: Stage,
        requests: &[ScoringRequest<'_>],
    ) -> Result<Vec<RewardValue>, PipelineError>;
}

impl<T: RewardScorer + ?Sized> RewardScorer for Arc<T> {
    fn score(
        &self,
        stage: Stage,
        requests: &[ScoringRequest<'_>],
    ) -> Result<Vec<RewardValue>, PipelineError> {
        (**self).score(stage, requests)
    }
}

impl<T: RewardScorer + ?Sized> RewardScorer for Box<T> {
    fn score(
        &self,
        stage: Stage,
        requests: &[ScoringRequest<'_>],
    ) -> Result<Vec<RewardValue>, PipelineError> {
        (**self).score(stage, requests)
    }
}

/// A selected column with the reward it was ranked by.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedColumn {
    /// Flattened column name, e.g. `agent_answers_peer_7`.
    pub column: ColumnName,
    /// `None` when the column was sampled at random.
    pub reward: Option<RewardValue>,
}

/// Ordered sample of at most `k` columns of one contribution field.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionResult {
    field: ContributionField,
    entries: Vec<SelectedColumn>,
    tie_at_cutoff: bool,
}

impl SelectionResult {
    /// Empty selection for `field`.
    pub fn empty(field: ContributionField) -> Self {
        Self {
            field,
            entries: Vec::new(),
            tie_at_cutoff: false,
        }
    }

    /// Field every selected column belongs to.
    pub fn field(&self) -> ContributionField {
        self.field
    }

    /// Selected entries, ascending by selection key for `TopK`.
    pub fn entries(&self) -> &[SelectedColumn] {
        &self.entries
    }

    /// Selected column names, in selection order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.column.as_str())
    }

    /// Contributor ids of the selected columns, in selection order.
    pub fn contributors(&self, codec: &ColumnCodec) -> Vec<ContributorId> {
        self.columns()
            .filter_map(|column| codec.decode_in(self.field, column))
            .collect()
    }

    /// True when the last kept and first dropped candidate had equal rewards,
    /// so the column-name hash decided membership rather than the scorer.
    pub fn decided_by_tiebreak(&self) -> bool {
        self.tie_at_cutoff
    }

    /// Number of selected columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct RankedColumn<'a> {
    key: RewardValue,
    reward: RewardValue,
    tiebreaker: TieBreaker,
    column: &'a str,
}

impl RankedColumn<'_> {
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.tiebreaker.cmp(&other.tiebreaker))
            .then_with(|| self.column.cmp(other.column))
    }
}

/// Picks a bounded, reproducible sample of contribution columns.
#[derive(Clone, Debug)]
pub struct ContributionSelector {
    k: usize,
    method: SelectionMethod,
    seed: Option<u64>,
    order: RewardOrder,
}

impl ContributionSelector {
    /// Selector keeping at most `k` columns with `method`.
    pub fn new(k: usize, method: SelectionMethod) -> Self {
        Self {
            k,
            method,
            seed: None,
            order: RewardOrder::HigherIsBetter,
        }
    }

    /// Selector configured from the pipeline settings.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            k: config.k,
            method: config.method,
            seed: config.seed,
            order: config.reward_order,
        }
    }

    /// Fix the seed used by uniform random sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the scorer's ranking direction.
    pub fn with_reward_order(mut self, order: RewardOrder) -> Self {
        self.order = order;
        self
    }

    /// Maximum number of columns kept.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Sampling method in use.
    pub fn method(&self) -> SelectionMethod {
        self.method
    }

    /// Select at most `k` of `candidates` (columns of `field` in `row`).
    ///
    /// The scorer is only consulted for `TopK` and never for an empty
    /// candidate set or `k == 0`.
    pub fn select<C, S>(
        &self,
        row: &FlatRecord,
        field: ContributionField,
        candidates: &[C],
        stage: Stage,
        scorer: &S,
    ) -> Result<SelectionResult, PipelineError>
    where
        C: AsRef<str>,
        S: RewardScorer + ?Sized,
    {
        let unique: IndexSet<&str> = candidates
            .iter()
            .map(|candidate| candidate.as_ref())
            .collect();
        if self.k == 0 || unique.is_empty() {
            return Ok(SelectionResult::empty(field));
        }
        let pool: Vec<&str> = unique.into_iter().collect();
        let (entries, tie_at_cutoff) = match self.method {
            SelectionMethod::TopK => self.top_k(row, &pool, stage, scorer)?,
            SelectionMethod::UniformRandom => (self.uniform_random(row, pool), false),
        };
        debug!(
            stage = %stage,
            field = %field,
            selected = entries.len(),
            method = ?self.method,
            "[swarm_prompts:selector] selected contributions"
        );
        Ok(SelectionResult {
            field,
            entries,
            tie_at_cutoff,
        })
    }

    fn top_k<S>(
        &self,
        row: &FlatRecord,
        pool: &[&str],
        stage: Stage,
        scorer: &S,
    ) -> Result<(Vec<SelectedColumn>, bool), PipelineError>
    where
        S: RewardScorer + ?Sized,
    {
        let mut requests = Vec::with_capacity(pool.len());
        for column in pool {
            let completion = row
                .value(column)
                .ok_or_else(|| PipelineError::MissingColumn {
                    column: column.to_string(),
                })?;
            requests.push(ScoringRequest {
                question: &row.question,
                completion,
                answer: row.answer.as_deref(),
            });
        }
        let rewards = scorer.score(stage, &requests)?;
        if rewards.len() != pool.len() {
            return Err(PipelineError::RewardCountMismatch {
                stage,
                expected: pool.len(),
                got: rewards.len(),
            });
        }

        let mut ranked = Vec::with_capacity(pool.len());
        for (column, reward) in pool.iter().zip(rewards) {
            if reward.is_nan() {
                return Err(PipelineError::NonNumericReward {
                    column: column.to_string(),
                });
            }
            let directed = match self.order {
                RewardOrder::HigherIsBetter => reward,
                RewardOrder::LowerIsBetter => -reward,
            };
            ranked.push(RankedColumn {
                // Adding 0.0 folds -0.0 into 0.0 so the two tie.
                key: directed + 0.0,
                reward,
                tiebreaker: column_tiebreaker(column),
                column,
            });
        }
        ranked.sort_by(RankedColumn::cmp_key);

        let start = ranked.len().saturating_sub(self.k);
        let tie_at_cutoff = start > 0 && ranked[start - 1].key == ranked[start].key;
        let kept: Vec<SelectedColumn> = ranked[start..]
            .iter()
            .map(|entry| SelectedColumn {
                column: entry.column.to_string(),
                reward: Some(entry.reward),
            })
            .collect();
        Ok((kept, tie_at_cutoff))
    }

    fn uniform_random(&self, row: &FlatRecord, mut pool: Vec<&str>) -> Vec<SelectedColumn> {
        pool.sort_unstable();
        let amount = self.k.min(pool.len());
        let picked: Vec<&str> = match self.seed {
            Some(seed) => {
                let mut rng =
                    StdRng::seed_from_u64(record_seed(seed ^ RANDOM_SEED_OFFSET, &row.question));
                pool.choose_multiple(&mut rng, amount).copied().collect()
            }
            None => {
                let mut rng = rand::rng();
                pool.choose_multiple(&mut rng, amount).copied().collect()
            }
        };
        picked
            .into_iter()
            .map(|column| SelectedColumn {
                column: column.to_string(),
                reward: None,
            })
            .collect()
    }
}
