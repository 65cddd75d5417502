//! Active namespaces and search domains.

use std::collections::BTreeSet;

/// What the reconciler last installed.
///
/// Mutated only by [`Reconciler::update`](crate::Reconciler::update) and
/// never re-derived from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerState {
    /// Namespaces with an installed per-namespace file.
    pub namespaces: BTreeSet<String>,
    /// Search domains, in the order they were requested.
    pub search: Vec<String>,
}

/// Namespaces to remove and add to move from one state to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceDiff {
    /// Active before, not requested now.
    pub removals: Vec<String>,
    /// Requested now, not active before.
    pub additions: Vec<String>,
}

impl NamespaceDiff {
    /// Returns `true` if no namespace file changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.additions.is_empty()
    }
}

impl ReconcilerState {
    /// Replaces the state with `next` and returns the namespace diff.
    pub fn replace(&mut self, next: Self) -> NamespaceDiff {
        let diff = NamespaceDiff {
            removals: self
                .namespaces
                .difference(&next.namespaces)
                .cloned()
                .collect(),
            additions: next
                .namespaces
                .difference(&self.namespaces)
                .cloned()
                .collect(),
        };
        *self = next;
        diff
    }

    /// Empties the state, returning the namespaces that were active.
    pub fn take_namespaces(&mut self) -> BTreeSet<String> {
        self.search.clear();
        std::mem::take(&mut self.namespaces)
    }
}
