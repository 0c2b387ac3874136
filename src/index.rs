use std::collections::BTreeMap;

use crate::codec::ColumnCodec;
use crate::selector::SelectionResult;
use crate::types::ContributorId;

/// Bijection from sampled contributors to display indices `0..n`.
///
/// Indices follow ascending contributor-id order, so the same id set always
/// yields the same assignment regardless of selection order. Indices are not
/// comparable across records or stages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalIndex {
    ids: Vec<ContributorId>,
}

impl CanonicalIndex {
    /// Index an arbitrary collection of ids (duplicates collapse).
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ContributorId>,
    {
        let mut ids: Vec<ContributorId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        Self { ids }
    }

    /// Index the contributors behind a selection.
    pub fn from_selection(codec: &ColumnCodec, selection: &SelectionResult) -> Self {
        Self::from_ids(selection.contributors(codec))
    }

    /// Display index of `id`, if it was sampled.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids
            .binary_search_by(|probe| probe.as_str().cmp(id))
            .ok()
    }

    /// Contributor shown at `index`.
    pub fn contributor(&self, index: usize) -> Option<&ContributorId> {
        self.ids.get(index)
    }

    /// `(index, contributor)` pairs in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ContributorId)> {
        self.ids.iter().enumerate()
    }

    /// Contributors in ascending index order.
    pub fn contributors(&self) -> &[ContributorId] {
        &self.ids
    }

    /// The assignment as an explicit map.
    pub fn to_map(&self) -> BTreeMap<ContributorId, usize> {
        self.iter().map(|(index, id)| (id.clone(), index)).collect()
    }

    /// Number of indexed contributors.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing was sampled.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
