// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;

use crate::{BoundedSearchEngine, SearchError, SearchProblem, SearchReport, DEFAULT_MAX_DEPTH};

/// Queue-based breadth-first engine; the solution it returns is at the
/// shallowest depth where any solution exists.
#[derive(Debug)]
pub struct BoundedBreadthFirst<S> {
    max_depth: usize,
    solution: Option<(S, usize)>,
    report: SearchReport,
}

impl<S> Default for BoundedBreadthFirst<S> {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            solution: None,
            report: SearchReport::default(),
        }
    }
}

impl<S: Clone> BoundedBreadthFirst<S> {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

impl<S: Clone> BoundedSearchEngine<S> for BoundedBreadthFirst<S> {
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

        let mut queue: VecDeque<(S, usize)> = VecDeque::new();
        queue.push_back((problem.initial_state()?, 0));

        while let Some((state, depth)) = queue.pop_front() {
            self.report.record_visit(depth);
            if problem.is_successful(&state)? {
                log::info!(
                    "BoundedBreadthFirst::perform_search; success at depth {} {}",
                    depth,
                    self.report
                );
                self.solution = Some((state, depth));
                return Ok(true);
            }
            if depth < self.max_depth {
                let children = problem.successors(&state)?;
                self.report.record_expansion(children.len());
                queue.extend(children.into_iter().map(|c| (c, depth + 1)));
            }
        }
        log::info!(
            "BoundedBreadthFirst::perform_search; max_depth: {} exhausted {}",
            self.max_depth,
            self.report
        );
        Ok(false)
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Counting {
        goal: u32,
        order: Vec<u32>,
    }

    impl SearchProblem for Counting {
        type State = u32;
        type Error = ();

        fn initial_state(&mut self) -> Result<u32, ()> {
            Ok(1)
        }

        fn successors(&mut self, state: &u32) -> Result<Vec<u32>, ()> {
            Ok(vec![state * 2, state * 2 + 1])
        }

        fn is_successful(&mut self, state: &u32) -> Result<bool, ()> {
            self.order.push(*state);
            Ok(*state == self.goal)
        }
    }

    #[test]
    fn test_visits_level_by_level() {
        // Heap numbering: level order is 1, 2, 3, 4, ...
        let mut problem = Counting {
            goal: 6,
            order: vec![],
        };
        let mut engine = BoundedBreadthFirst::new(3);
        assert_eq!(engine.perform_search(&mut problem), Ok(true));
        assert_eq!(problem.order, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(engine.solution_depth(), Some(2));
    }

    #[test]
    fn test_bound_zero_checks_only_initial_state() {
        let mut problem = Counting {
            goal: 2,
            order: vec![],
        };
        let mut engine = BoundedBreadthFirst::new(0);
        assert_eq!(engine.perform_search(&mut problem), Ok(false));
        assert_eq!(problem.order, vec![1]);
        assert_eq!(engine.report().expanded, 0);
    }
}
