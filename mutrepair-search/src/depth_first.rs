// SPDX-License-Identifier: Apache-2.0

use crate::{BoundedSearchEngine, SearchError, SearchProblem, SearchReport, DEFAULT_MAX_DEPTH};

/// Recursive depth-first engine.
///
/// Success is checked at every visited state before it is expanded, so the
/// initial state can be a solution at depth zero. A state at the bound is a
/// leaf. The first success along depth-first order wins; it need not be the
/// shallowest one.
#[derive(Debug)]
pub struct BoundedDepthFirst<S> {
    max_depth: usize,
    solution: Option<(S, usize)>,
    report: SearchReport,
}

impl<S> Default for BoundedDepthFirst<S> {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            solution: None,
            report: SearchReport::default(),
        }
    }
}

impl<S: Clone> BoundedDepthFirst<S> {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    fn search_from<P>(&mut self, problem: &mut P, state: &S, depth: usize) -> Result<bool, P::Error>
    where
        P: SearchProblem<State = S>,
    {
        self.report.record_visit(depth);
        if problem.is_successful(state)? {
            log::debug!("BoundedDepthFirst::search_from; success at depth {}", depth);
            self.solution = Some((state.clone(), depth));
            return Ok(true);
        }
        if depth >= self.max_depth {
            return Ok(false);
        }
        let children = problem.successors(state)?;
        self.report.record_expansion(children.len());
        log::trace!(
            "BoundedDepthFirst::search_from; depth: {} successors: {}",
            depth,
            children.len()
        );
        for child in children.iter() {
            if self.search_from(problem, child, depth + 1)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<S: Clone> BoundedSearchEngine<S> for BoundedDepthFirst<S> {
    fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn perform_search<P>(&mut self, problem: &mut P) -> Result<bool, P::Error>
    where
        P: SearchProblem<State = S>,
    {
        self.solution = None;
        self.report = SearchReport::default();
        let initial = problem.initial_state()?;
        let found = self.search_from(problem, &initial, 0)?;
        log::info!(
            "BoundedDepthFirst::perform_search; max_depth: {} found: {} {}",
            self.max_depth,
            found,
            self.report
        );
        Ok(found)
    }

    fn solution(&self) -> Result<&S, SearchError> {
        self.solution
            .as_ref()
            .map(|(s, _)| s)
            .ok_or(SearchError::NoSolution)
    }

    fn solution_depth(&self) -> Option<usize> {
        self.solution.as_ref().map(|(_, d)| *d)
    }

    fn report(&self) -> SearchReport {
        self.report
    }
}
