//! Bidirectional encoding between contribution maps and flat column names.
//!
//! A column is named `<field>_<contributor>`. Decoding strips the known
//! field prefix and keeps the remainder verbatim, so contributor ids may
//! contain the delimiter themselves.

use indexmap::IndexSet;
use tracing::debug;

use crate::constants::codec::{FIELD_DELIMITER, RESERVED_COLUMNS};
use crate::data::{ContributionField, FlatBatch, FlatColumn, FlatRecord, Record};
use crate::errors::PipelineError;
use crate::types::{ColumnName, ContributorId};

/// Registry of contribution fields whose column prefixes are pairwise disjoint.
#[derive(Clone, Debug)]
pub struct ColumnCodec {
    fields: Vec<ContributionField>,
}

impl Default for ColumnCodec {
    fn default() -> Self {
        Self {
            fields: ContributionField::ALL.to_vec(),
        }
    }
}

impl ColumnCodec {
    /// Build a codec over `fields`, rejecting prefixes that could decode ambiguously.
    pub fn new(fields: impl IntoIterator<Item = ContributionField>) -> Result<Self, PipelineError> {
        let mut unique: Vec<ContributionField> = Vec::new();
        for field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        for (pos, first) in unique.iter().enumerate() {
            let first_prefix = column_prefix(*first);
            for second in &unique[pos + 1..] {
                let second_prefix = column_prefix(*second);
                if first_prefix.starts_with(&second_prefix)
                    || second_prefix.starts_with(&first_prefix)
                {
                    return Err(PipelineError::PrefixCollision {
                        first: first.name().to_string(),
                        second: second.name().to_string(),
                    });
                }
            }
            if let Some(column) = RESERVED_COLUMNS
                .iter()
                .find(|column| column.starts_with(&first_prefix))
            {
                return Err(PipelineError::ReservedColumn {
                    column: column.to_string(),
                    field: first.name().to_string(),
                });
            }
        }
        Ok(Self { fields: unique })
    }

    /// Registered fields.
    pub fn fields(&self) -> &[ContributionField] {
        &self.fields
    }

    /// Column name for one contributor's entry in `field`.
    pub fn encode(&self, field: ContributionField, contributor: &ContributorId) -> ColumnName {
        format!("{}{}", column_prefix(field), contributor)
    }

    /// Recover the field and contributor encoded in `column`.
    pub fn decode_column(&self, column: &str) -> Option<(ContributionField, ContributorId)> {
        self.fields.iter().find_map(|field| {
            strip_field(*field, column).map(|id| (*field, ContributorId::new(id)))
        })
    }

    /// Contributor encoded in `column` when it belongs to `field`.
    pub fn decode_in(&self, field: ContributionField, column: &str) -> Option<ContributorId> {
        strip_field(field, column).map(ContributorId::new)
    }

    /// Sorted contributor ids of every column in `columns` that belongs to `field`.
    pub fn decode<'a, I>(&self, columns: I, field: ContributionField) -> Vec<ContributorId>
    where
        I: IntoIterator<Item = &'a ColumnName>,
    {
        let mut ids: Vec<ContributorId> = columns
            .into_iter()
            .filter_map(|column| self.decode_in(field, column))
            .collect();
        ids.sort();
        ids
    }

    /// Explode one field of `record` into columns, in contributor order.
    pub fn flatten(&self, record: &Record, field: ContributionField) -> Vec<FlatColumn> {
        record
            .contributions(field)
            .map(|map| {
                map.iter()
                    .map(|(contributor, text)| FlatColumn {
                        name: self.encode(field, contributor),
                        value: text.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Explode every registered field of `record`.
    pub fn flatten_record(&self, record: &Record) -> FlatRecord {
        let mut flat = FlatRecord {
            question: record.question.clone(),
            answer: record.answer.clone(),
            stage2_prompt: record.stage2_prompt.clone(),
            ..FlatRecord::default()
        };
        for field in &self.fields {
            for column in self.flatten(record, *field) {
                flat.columns.insert(column.name, column.value);
            }
        }
        flat
    }

    /// Flatten a batch and compute the sorted union of its column names.
    pub fn flatten_batch(&self, records: &[Record]) -> FlatBatch {
        let rows: Vec<FlatRecord> = records
            .iter()
            .map(|record| self.flatten_record(record))
            .collect();
        let mut union: IndexSet<ColumnName> = IndexSet::new();
        for row in &rows {
            union.extend(row.column_names().cloned());
        }
        let mut columns: Vec<ColumnName> = union.into_iter().collect();
        columns.sort();
        debug!(
            rows = rows.len(),
            columns = columns.len(),
            "[swarm_prompts:codec] flattened batch"
        );
        FlatBatch { columns, rows }
    }

    /// Columns of `columns` that belong to `field`, in input order.
    pub fn columns_for<'a>(
        &self,
        columns: &'a [ColumnName],
        field: ContributionField,
    ) -> Vec<&'a ColumnName> {
        columns
            .iter()
            .filter(|column| strip_field(field, column).is_some())
            .collect()
    }
}

fn column_prefix(field: ContributionField) -> String {
    format!("{}{}", field.name(), FIELD_DELIMITER)
}

fn strip_field(field: ContributionField, column: &str) -> Option<&str> {
    column
        .strip_prefix(field.name())
        .and_then(|rest| rest.strip_prefix(FIELD_DELIMITER))
}
