//! Intersect accumulator

use thiserror::Error;

/// Result type for intersect operations
pub type IntersectResult<T> = Result<T, IntersectError>;

/// Intersect errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntersectError {
    #[error("Result requested before execution")]
    NotExecuted,
}

/// Accumulator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectState {
    /// No clauses pushed
    Init,
    /// Clauses pushed, nothing computed since the last push
    Ready,
    /// Result computed
    Done,
}

/// Executed set operations, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone)]
struct Clause {
    ids: Vec<u32>,
    sorted: bool,
}

/// Lazily combined query clauses
#[derive(Debug, Clone)]
pub struct Intersect {
    clauses: Vec<Clause>,
    result: Vec<u32>,
    state: IntersectState,
    history: Vec<IntersectOp>,
}

impl Default for Intersect {
    fn default() -> Self {
        Self::new()
    }
}

impl Intersect {
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
            result: Vec::new(),
            state: IntersectState::Init,
            history: Vec::new(),
        }
    }

    /// Add a clause. An empty clause becomes the `0` sentinel.
    pub fn push(&mut self, ids: Vec<u32>, is_sorted: bool) {
        let clause = if ids.is_empty() {
            Clause {
                ids: vec![0],
                sorted: true,
            }
        } else {
            Clause {
                ids,
                sorted: is_sorted,
            }
        };
        self.clauses.push(clause);
        self.state = IntersectState::Ready;
    }

    /// Add another accumulator's computed result as one clause
    pub fn push_result(&mut self, other: &Intersect) {
        self.push(other.result.clone(), true);
    }

    pub fn state(&self) -> IntersectState {
        self.state
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub fn history(&self) -> &[IntersectOp] {
        &self.history
    }

    /// Ids present in every clause
    pub fn exec_and(&mut self, dedupe: bool) -> &[u32] {
        self.sort_clauses();
        let mut result = Vec::new();
        if let Some((smallest, _)) = self
            .clauses
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.ids.len())
        {
            for id in &self.clauses[smallest].ids {
                let everywhere = self
                    .clauses
                    .iter()
                    .enumerate()
                    .all(|(i, c)| i == smallest || c.ids.binary_search(id).is_ok());
                if everywhere {
                    result.push(*id);
                }
            }
        }
        self.finish(result, dedupe, IntersectOp::And)
    }

    /// Sorted union of every clause
    pub fn exec_or(&mut self, dedupe: bool) -> &[u32] {
        let mut result: Vec<u32> = self
            .clauses
            .iter()
            .flat_map(|c| c.ids.iter().copied())
            .collect();
        result.sort_unstable();
        self.finish(result, dedupe, IntersectOp::Or)
    }

    /// Ids of the first clause that appear in no later clause
    pub fn exec_not(&mut self, dedupe: bool) -> &[u32] {
        self.sort_clauses();
        let result = match self.clauses.split_first() {
            Some((first, rest)) => first
                .ids
                .iter()
                .copied()
                .filter(|id| rest.iter().all(|c| c.ids.binary_search(id).is_err()))
                .collect(),
            None => Vec::new(),
        };
        self.finish(result, dedupe, IntersectOp::Not)
    }

    /// Computed result and its length
    pub fn get_result(&self) -> IntersectResult<(&[u32], usize)> {
        match self.state {
            IntersectState::Done => Ok((&self.result, self.result.len())),
            _ => Err(IntersectError::NotExecuted),
        }
    }

    /// Computed result, empty before execution
    pub fn result(&self) -> &[u32] {
        &self.result
    }

    /// Computed result for reordering in place. Ids cannot be added or
    /// removed through it.
    pub fn result_mut(&mut self) -> &mut [u32] {
        &mut self.result
    }

    /// Drop every clause and result
    pub fn clear(&mut self) {
        self.clauses.clear();
        self.result.clear();
        self.history.clear();
        self.state = IntersectState::Init;
    }

    fn sort_clauses(&mut self) {
        for clause in self.clauses.iter_mut().filter(|c| !c.sorted) {
            clause.ids.sort_unstable();
            clause.sorted = true;
        }
    }

    fn finish(&mut self, mut result: Vec<u32>, dedupe: bool, op: IntersectOp) -> &[u32] {
        if dedupe {
            result.dedup();
            result.retain(|id| *id != 0);
        }
        self.result = result;
        self.history.push(op);
        self.state = IntersectState::Done;
        &self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_intersects_all_clauses() {
        let mut intersect = Intersect::new();
        intersect.push(vec![1, 2, 3, 4, 5], true);
        intersect.push(vec![5, 3, 1, 9], false);
        intersect.push(vec![3, 5, 7], true);
        assert_eq!(intersect.exec_and(true), &[3, 5]);
    }

    #[test]
    fn test_and_independent_of_push_order() {
        let clauses = [vec![4, 8, 15, 16], vec![16, 4, 23], vec![42, 16, 4, 8]];
        let orders = [[0, 1, 2], [2, 1, 0], [1, 2, 0]];
        for order in orders {
            let mut intersect = Intersect::new();
            for i in order {
                intersect.push(clauses[i].clone(), false);
            }
            assert_eq!(intersect.exec_and(true), &[4, 16]);
        }
    }

    #[test]
    fn test_empty_clause_yields_empty_and() {
        let mut intersect = Intersect::new();
        intersect.push(vec![1, 2, 3], true);
        intersect.push(Vec::new(), true);
        assert!(intersect.exec_and(true).is_empty());
    }

    #[test]
    fn test_or_is_sorted_unique_union() {
        let mut intersect = Intersect::new();
        intersect.push(vec![5, 1], false);
        intersect.push(vec![3, 5], false);
        intersect.push(Vec::new(), true);
        assert_eq!(intersect.exec_or(true), &[1, 3, 5]);
    }

    #[test]
    fn test_sentinel_kept_without_dedupe() {
        let mut intersect = Intersect::new();
        intersect.push(Vec::new(), true);
        intersect.push(Vec::new(), true);
        assert_eq!(intersect.exec_and(false), &[0]);
        assert!(intersect.exec_and(true).is_empty());
    }

    #[test]
    fn test_not_removes_later_clauses() {
        let mut intersect = Intersect::new();
        intersect.push(vec![1, 2, 3, 4, 5], true);
        intersect.push(vec![2, 4], true);
        intersect.push(Vec::new(), true);
        assert_eq!(intersect.exec_not(true), &[1, 3, 5]);
    }

    #[test]
    fn test_state_transitions_and_recompute() {
        let mut intersect = Intersect::new();
        assert_eq!(intersect.state(), IntersectState::Init);
        assert_eq!(intersect.get_result(), Err(IntersectError::NotExecuted));

        intersect.push(vec![1, 2], true);
        assert_eq!(intersect.state(), IntersectState::Ready);
        intersect.exec_and(true);
        assert_eq!(intersect.state(), IntersectState::Done);
        assert_eq!(intersect.get_result().unwrap(), (&[1u32, 2][..], 2));

        intersect.push(vec![2], true);
        assert_eq!(intersect.state(), IntersectState::Ready);
        intersect.exec_and(true);
        assert_eq!(intersect.result(), &[2]);
        assert_eq!(intersect.history(), &[IntersectOp::And, IntersectOp::And]);
    }

    #[test]
    fn test_no_clauses_executes_to_empty() {
        let mut intersect = Intersect::new();
        assert!(intersect.exec_and(true).is_empty());
        assert!(intersect.exec_or(true).is_empty());
    }

    #[test]
    fn test_result_mut_reorders_without_resizing() {
        let mut intersect = Intersect::new();
        intersect.push(vec![1, 2, 3], true);
        intersect.exec_or(true);
        intersect.result_mut().reverse();
        assert_eq!(intersect.result(), &[3, 2, 1]);
        assert_eq!(intersect.get_result().unwrap().1, 3);
    }

    #[test]
    fn test_push_result_chains_accumulators() {
        let mut local = Intersect::new();
        local.push(vec![1, 2, 3], true);
        local.push(vec![2, 3], true);
        local.exec_and(true);

        let mut outer = Intersect::new();
        outer.push_result(&local);
        outer.push(vec![3, 4], true);
        assert_eq!(outer.exec_and(true), &[3]);
    }
}
