// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Counters accumulated by one `perform_search` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchReport {
    /// States whose success predicate was evaluated.
    pub visited: usize,
    /// States whose successors were requested.
    pub expanded: usize,
    /// Total successors returned by the problem.
    pub generated: usize,
    pub deepest: usize,
}

impl SearchReport {
    pub(crate) fn record_visit(&mut self, depth: usize) {
        self.visited += 1;
        self.deepest = self.deepest.max(depth);
    }

    pub(crate) fn record_expansion(&mut self, successors: usize) {
        self.expanded += 1;
        self.generated += successors;
    }
}

impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Number of visited states: {} (expanded: {}, generated: {}, deepest level: {})",
            self.visited, self.expanded, self.generated, self.deepest
        )
    }
}
