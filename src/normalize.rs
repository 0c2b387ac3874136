use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::constants::normalize::PARALLEL_UNION_THRESHOLD;
use crate::data::{ContributionField, Record};
use crate::types::ContributorId;

/// Per-field summary of a normalization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Size of each field's canonical key set.
    pub key_counts: BTreeMap<ContributionField, usize>,
    /// Number of sentinel entries inserted per field.
    pub backfilled: BTreeMap<ContributionField, usize>,
}

impl NormalizeReport {
    /// Total sentinel entries inserted across all fields.
    pub fn total_backfilled(&self) -> usize {
        self.backfilled.values().sum()
    }
}

/// Union of contributor ids observed in `field` across `records`.
///
/// Records without the field contribute nothing. Large batches are reduced
/// in parallel; the result does not depend on record order.
pub fn union_keys(records: &[Record], field: ContributionField) -> BTreeSet<ContributorId> {
    let keys_of = |record: &Record| -> BTreeSet<ContributorId> {
        record
            .contributions(field)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    };
    if records.len() >= PARALLEL_UNION_THRESHOLD {
        records
            .par_iter()
            .map(keys_of)
            .reduce(BTreeSet::new, |mut left, right| {
                left.extend(right);
                left
            })
    } else {
        records.iter().fold(BTreeSet::new(), |mut acc, record| {
            acc.extend(keys_of(record));
            acc
        })
    }
}

/// Give every record that carries a field the field's full key set.
///
/// Missing entries are filled with `sentinel`; existing entries are left
/// untouched. Records that lack a field entirely keep lacking it.
pub fn normalize_batch(
    records: &mut [Record],
    fields: &[ContributionField],
    sentinel: &str,
) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    for field in fields {
        let keys = union_keys(records, *field);
        let mut filled = 0usize;
        for record in records.iter_mut() {
            let Some(map) = record.contributions_mut(*field) else {
                continue;
            };
            for key in &keys {
                if !map.contains_key(key) {
                    map.insert(key.clone(), sentinel.to_string());
                    filled += 1;
                }
            }
        }
        if filled > 0 {
            debug!(
                field = %field,
                keys = keys.len(),
                backfilled = filled,
                "[swarm_prompts:normalize] backfilled missing contributions"
            );
        }
        report.key_counts.insert(*field, keys.len());
        report.backfilled.insert(*field, filled);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(record: &Record) -> Vec<(&str, &str)> {
        record
            .contributions(ContributionField::Answers)
            .map(|map| {
                map.iter()
                    .map(|(id, text)| (id.as_str(), text.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn backfills_missing_keys_with_sentinel() {
        let mut records = vec![
            Record::new("q1").with_contribution(ContributionField::Answers, "x", "hi"),
            Record::new("q2").with_contribution(ContributionField::Answers, "y", "yo"),
        ];
        let report = normalize_batch(&mut records, &[ContributionField::Answers], "missing");
        assert_eq!(answers(&records[0]), vec![("x", "hi"), ("y", "missing")]);
        assert_eq!(answers(&records[1]), vec![("x", "missing"), ("y", "yo")]);
        assert_eq!(report.total_backfilled(), 2);
        assert_eq!(report.key_counts[&ContributionField::Answers], 2);
    }

    #[test]
    fn fields_are_normalized_independently() {
        let mut records = vec![
            Record::new("q1")
                .with_contribution(ContributionField::Answers, "a", "1")
                .with_contribution(ContributionField::Opinions, "c", "ok"),
            Record::new("q2")
                .with_contribution(ContributionField::Answers, "b", "2")
                .with_contribution(ContributionField::Opinions, "d", "meh"),
        ];
        normalize_batch(&mut records, &ContributionField::ALL, "-");
        let opinions = records[0]
            .contributions(ContributionField::Opinions)
            .unwrap();
        let keys: Vec<&str> = opinions.keys().map(ContributorId::as_str).collect();
        assert_eq!(keys, vec!["c", "d"]);
    }

    #[test]
    fn absent_fields_are_skipped() {
        let mut records = vec![
            Record::new("q1").with_contribution(ContributionField::Answers, "a", "1"),
            Record::new("q2"),
        ];
        let report = normalize_batch(&mut records, &ContributionField::ALL, "-");
        assert!(records[1].answers.is_none());
        assert!(records[0].opinions.is_none());
        assert_eq!(report.key_counts[&ContributionField::Opinions], 0);
        assert_eq!(report.total_backfilled(), 0);
    }

    #[test]
    fn parallel_union_matches_sequential_union() {
        let records: Vec<Record> = (0..PARALLEL_UNION_THRESHOLD + 10)
            .map(|idx| {
                Record::new(format!("q{idx}")).with_contribution(
                    ContributionField::Answers,
                    format!("peer_{}", idx % 37),
                    "text",
                )
            })
            .collect();
        let parallel = union_keys(&records, ContributionField::Answers);
        let sequential = union_keys(&records[..40], ContributionField::Answers);
        assert_eq!(parallel.len(), 37);
        assert_eq!(parallel, sequential);
    }
}
