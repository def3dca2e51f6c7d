//! Formula reference diffing.
//!
//! A job's `formulas` list is authoritative; each referenced formula keeps a
//! reciprocal `jobs` list. When the job side changes, only the formulas that
//! entered or left the list need their back-reference touched.

use std::collections::HashSet;

use mixbook_core::FormulaId;

/// Formulas whose back-reference must be added or removed.
///
/// Both lists are duplicate-free and keep first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaChanges {
    pub additions: Vec<FormulaId>,
    pub removals: Vec<FormulaId>,
}

impl FormulaChanges {
    /// Every formula of a job that is going away.
    pub fn removals_only(old: &[FormulaId]) -> Self {
        formula_changes(old, &[])
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Compare an old and a new formula list.
///
/// `additions` are ids present in `new` but not in `old`; `removals` are ids
/// present in `old` but not in `new`. Repeated ids count once.
pub fn formula_changes(old: &[FormulaId], new: &[FormulaId]) -> FormulaChanges {
    let old_set: HashSet<&FormulaId> = old.iter().collect();
    let new_set: HashSet<&FormulaId> = new.iter().collect();

    FormulaChanges {
        additions: distinct_missing(new, &old_set),
        removals: distinct_missing(old, &new_set),
    }
}

fn distinct_missing(list: &[FormulaId], other: &HashSet<&FormulaId>) -> Vec<FormulaId> {
    let mut seen = HashSet::new();
    list.iter()
        .filter(|id| !other.contains(id) && seen.insert(*id))
        .cloned()
        .collect()
}
