// SPDX-License-Identifier: Apache-2.0

//! Depth-bounded search over an abstract state space.
//!
//! A [`SearchProblem`] supplies an initial state, the successors of a state,
//! and a success predicate. Engines walk that space either depth-first or
//! breadth-first, never expanding a state that sits at the configured bound.
//! Absence of a solution is reported through the boolean result of
//! [`BoundedSearchEngine::perform_search`]; only errors raised by the problem
//! itself abort a search.

use std::fmt;
use std::str::FromStr;

mod breadth_first;
mod depth_first;
mod report;

pub use breadth_first::BoundedBreadthFirst;
pub use depth_first::BoundedDepthFirst;
pub use report::SearchReport;

/// Bound used when the caller does not configure one.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// A state space as seen by the search engines.
pub trait SearchProblem {
    type State: Clone;
    type Error;

    fn initial_state(&mut self) -> Result<Self::State, Self::Error>;

    /// Successors in the order the engines should explore them.
    fn successors(&mut self, state: &Self::State) -> Result<Vec<Self::State>, Self::Error>;

    fn is_successful(&mut self, state: &Self::State) -> Result<bool, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// `solution()` was queried without a preceding successful search.
    NoSolution,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::NoSolution => {
                write!(f, "no solution available; the last search did not succeed")
            }
        }
    }
}

impl std::error::Error for SearchError {}

pub trait BoundedSearchEngine<S> {
    fn set_max_depth(&mut self, max_depth: usize);

    fn max_depth(&self) -> usize;

    /// Returns `true` iff a successful state exists at depth `<= max_depth`
    /// along this engine's traversal order. Counters and any previous
    /// solution are reset at the start of every call.
    fn perform_search<P>(&mut self, problem: &mut P) -> Result<bool, P::Error>
    where
        P: SearchProblem<State = S>;

    fn solution(&self) -> Result<&S, SearchError>;

    /// Depth at which the current solution was found, if any.
    fn solution_depth(&self) -> Option<usize>;

    fn report(&self) -> SearchReport;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchStrategy {
    #[default]
    DepthFirst,
    BreadthFirst,
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStrategy::DepthFirst => write!(f, "dfs"),
            SearchStrategy::BreadthFirst => write!(f, "bfs"),
        }
    }
}

impl FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dfs" | "depth-first" => Ok(SearchStrategy::DepthFirst),
            "bfs" | "breadth-first" => Ok(SearchStrategy::BreadthFirst),
            other => Err(format!(
                "unknown search strategy '{}'; expected 'dfs' or 'bfs'",
                other
            )),
        }
    }
}

/// Either engine behind a single value, selected by [`SearchStrategy`].
#[derive(Debug)]
pub enum SearchEngine<S> {
    DepthFirst(BoundedDepthFirst<S>),
    BreadthFirst(BoundedBreadthFirst<S>),
}

impl<S: Clone> SearchEngine<S> {
    pub fn new(strategy: SearchStrategy, max_depth: usize) -> Self {
        match strategy {
            SearchStrategy::DepthFirst => {
                SearchEngine::DepthFirst(BoundedDepthFirst::new(max_depth))
            }
            SearchStrategy::BreadthFirst => {
                SearchEngine::BreadthFirst(BoundedBreadthFirst::new(max_depth))
            }
        }
    }

    pub fn strategy(&self) -> SearchStrategy {
        match self {
            SearchEngine::DepthFirst(_) => SearchStrategy::DepthFirst,
            SearchEngine::BreadthFirst(_) => SearchStrategy::BreadthFirst,
        }
    }
}

impl<S: Clone> BoundedSearchEngine<S> for SearchEngine<S> {
    fn set_max_depth(&mut self, max_depth: usize) {
        match self {
            SearchEngine::DepthFirst(e) => e.set_max_depth(max_depth),
            SearchEngine::BreadthFirst(e) => e.set_max_depth(max_depth),
        }
    }

    fn max_depth(&self) -> usize {
        match self {
            SearchEngine::DepthFirst(e) => e.max_depth(),
            SearchEngine::BreadthFirst(e) => e.max_depth(),
        }
    }

    fn perform_search<P>(&mut self, problem: &mut P) -> Result<bool, P::Error>
    where
        P: SearchProblem<State = S>,
    {
        match self {
            SearchEngine::DepthFirst(e) => e.perform_search(problem),
            SearchEngine::BreadthFirst(e) => e.perform_search(problem),
        }
    }

    fn solution(&self) -> Result<&S, SearchError> {
        match self {
            SearchEngine::DepthFirst(e) => e.solution(),
            SearchEngine::BreadthFirst(e) => e.solution(),
        }
    }

    fn solution_depth(&self) -> Option<usize> {
        match self {
            SearchEngine::DepthFirst(e) => e.solution_depth(),
            SearchEngine::BreadthFirst(e) => e.solution_depth(),
        }
    }

    fn report(&self) -> SearchReport {
        match self {
            SearchEngine::DepthFirst(e) => e.report(),
            SearchEngine::BreadthFirst(e) => e.report(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("dfs", SearchStrategy::DepthFirst; "short dfs")]
    #[test_case("BFS", SearchStrategy::BreadthFirst; "upper bfs")]
    #[test_case("depth-first", SearchStrategy::DepthFirst; "long dfs")]
    #[test_case("breadth-first", SearchStrategy::BreadthFirst; "long bfs")]
    fn test_strategy_from_str(text: &str, want: SearchStrategy) {
        assert_eq!(text.parse::<SearchStrategy>(), Ok(want));
    }

    #[test]
    fn test_strategy_from_str_rejects_unknown() {
        let err = "iddfs".parse::<SearchStrategy>().unwrap_err();
        assert!(err.contains("iddfs"), "{}", err);
    }

    #[test]
    fn test_strategy_display_round_trips() {
        for s in [SearchStrategy::DepthFirst, SearchStrategy::BreadthFirst] {
            assert_eq!(s.to_string().parse::<SearchStrategy>(), Ok(s));
        }
    }

    #[test]
    fn test_engine_carries_bound_and_strategy() {
        let mut engine: SearchEngine<u32> = SearchEngine::new(SearchStrategy::BreadthFirst, 5);
        assert_eq!(engine.strategy(), SearchStrategy::BreadthFirst);
        assert_eq!(engine.max_depth(), 5);
        engine.set_max_depth(0);
        assert_eq!(engine.max_depth(), 0);
        assert_eq!(engine.solution(), Err(SearchError::NoSolution));
        assert_eq!(engine.solution_depth(), None);
    }
}
