//! Selection tallies for one stage batch.
//!
//! Counts what the selector actually did per record: how many candidates it
//! saw, how many it kept, how many of the kept slots were filled by a
//! backfilled sentinel, and how often the column-name hash rather than the
//! reward decided the cutoff.

use std::collections::BTreeMap;

use crate::data::FlatRecord;
use crate::selector::SelectionResult;
use crate::types::ContributorId;

/// Aggregated selection behaviour across the rendered records of a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionStats {
    /// Records that produced a prompt.
    pub rows: usize,
    /// Candidate columns offered to the selector, summed over rows.
    pub candidates: usize,
    /// Columns kept, summed over rows.
    pub selected: usize,
    /// Kept columns whose text is the missing-contribution sentinel.
    pub sentinel_selected: usize,
    /// Rows with more candidates than slots.
    pub truncated_rows: usize,
    /// Rows whose cutoff fell inside a reward tie.
    pub tiebreak_rows: usize,
    /// How often each contributor was kept.
    pub per_contributor: BTreeMap<ContributorId, usize>,
}

impl SelectionStats {
    /// Fold one record's selection into the tallies.
    pub fn observe(
        &mut self,
        row: &FlatRecord,
        candidates: usize,
        selection: &SelectionResult,
        contributors: &[ContributorId],
        sentinel: &str,
    ) {
        self.rows += 1;
        self.candidates += candidates;
        self.selected += selection.len();
        self.sentinel_selected += selection
            .columns()
            .filter(|column| row.value(column) == Some(sentinel))
            .count();
        if candidates > selection.len() {
            self.truncated_rows += 1;
        }
        if selection.decided_by_tiebreak() {
            self.tiebreak_rows += 1;
        }
        for contributor in contributors {
            *self.per_contributor.entry(contributor.clone()).or_insert(0) += 1;
        }
    }

    /// Share of kept slots that carried no real contribution.
    pub fn sentinel_share(&self) -> f64 {
        if self.selected == 0 {
            0.0
        } else {
            self.sentinel_selected as f64 / self.selected as f64
        }
    }

    /// Average number of columns kept per rendered record.
    pub fn mean_selected(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.selected as f64 / self.rows as f64
        }
    }

    /// Contributor kept most often; ties resolve to the smallest id.
    pub fn most_selected(&self) -> Option<(&ContributorId, usize)> {
        self.per_contributor
            .iter()
            .fold(None, |best, (id, count)| match best {
                Some((_, top)) if top >= *count => best,
                _ => Some((id, *count)),
            })
    }
}
