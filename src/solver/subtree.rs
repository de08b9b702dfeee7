//! Search subtrees: scoped constraint posting and depth-first labeling.
//!
//! A subtree owns a set of decision variables and locally-posted
//! constraints. Activating it takes a root checkpoint and posts pending
//! static constraints followed by the local ones; `search` then labels
//! variables depth-first, backtracking through the trail on failure.
//! Subtrees nest: activating another subtree pushes onto the stack and
//! discarding returns to the previous one.

use crate::solver::engine::{SearchHeuristic, Solver};
use crate::solver::propagator::{
    ConstraintId, ConstraintSlot, Propagator, QueueState, PRIORITY_COUNT,
};
use crate::solver::trail::Checkpoint;
use crate::solver::VarRef;

/// Identifier of a subtree inside its solver
pub type SubtreeId = usize;

/// One backtracking checkpoint of a subtree.
#[derive(Debug, Clone, Copy)]
struct SearchCheckpoint {
    trail: Checkpoint,
    /// Static-constraint timestamp to restore
    timestamp: u64,
    /// Variable being labeled, `None` for the root checkpoint
    var: Option<VarRef>,
}

pub(crate) struct SubtreeData {
    /// Decision variables, in declaration order
    pub vars: Vec<VarRef>,
    /// Locally posted constraints, partitioned by priority
    pub constraints: [Vec<ConstraintId>; PRIORITY_COUNT],
    checkpoints: Vec<SearchCheckpoint>,
    active: bool,
    started: bool,
    inconsistent: bool,
    /// Subtree that was current when this one was activated
    previous: Option<SubtreeId>,
}

impl Solver {
    /// Create a new, inactive subtree.
    pub fn create_subtree(&mut self) -> SubtreeId {
        self.subtrees.push(SubtreeData {
            vars: Vec::new(),
            constraints: Default::default(),
            checkpoints: Vec::new(),
            active: false,
            started: false,
            inconsistent: false,
            previous: None,
        });
        self.subtrees.len() - 1
    }

    /// Shorthand: a subtree searching over the given decision variables.
    pub fn add_search(&mut self, vars: &[VarRef]) -> SubtreeId {
        let st = self.create_subtree();
        for &x in vars {
            self.subtree_add_var(st, x);
        }
        st
    }

    /// Add a decision variable. Must not be called once the subtree has been
    /// activated.
    pub fn subtree_add_var(&mut self, st: SubtreeId, x: VarRef) {
        assert!(!self.subtrees[st].active, "subtree already activated");
        self.subtrees[st].vars.push(x);
    }

    /// Post a constraint locally to a subtree. The constraint only
    /// propagates while the subtree is current.
    pub fn subtree_add(&mut self, st: SubtreeId, prop: Box<dyn Propagator>) -> ConstraintId {
        assert!(!self.subtrees[st].active, "subtree already activated");
        let id = self.constraints.len();
        let priority = prop.priority();
        self.constraints.push(ConstraintSlot {
            prop: Some(prop),
            priority,
            state: QueueState::Unqueued,
            done: false,
            done_stamp: 0,
            parent: Some(st),
            timestamp: 0,
        });
        self.subtrees[st].constraints[priority as usize].push(id);
        id
    }

    pub fn is_current(&self, st: SubtreeId) -> bool {
        self.current == Some(st)
    }

    pub fn is_active(&self, st: SubtreeId) -> bool {
        self.subtrees[st].active
    }

    /// Activate a subtree: push the root checkpoint, post pending static
    /// constraints, then the local constraints.
    pub fn activate(&mut self, st: SubtreeId) {
        assert!(!self.subtrees[st].active, "cannot activate active subtree");
        self.stats.subtrees += 1;
        let previous = self.current;
        self.subtrees[st].active = true;
        self.subtrees[st].previous = previous;
        self.subtrees[st].checkpoints.clear();
        self.push_checkpoint(st, None);

        // static constraints post outside any subtree scope
        self.current = None;
        let mut inconsistent = false;
        if self.ts_current < self.ts_last_constraint {
            inconsistent = !self.post_static();
        }
        self.current = Some(st);
        if !inconsistent {
            let lists = self.subtrees[st].constraints.clone();
            inconsistent = !self.post_locals(&lists);
        }
        self.subtrees[st].inconsistent = inconsistent;
        self.subtrees[st].started = false;
    }

    /// Discard the current subtree, restoring every domain to the state at
    /// activation. Locally posted constraints stay attached to the subtree
    /// and post again at the next activation.
    pub fn discard(&mut self, st: SubtreeId) {
        assert!(self.is_current(st), "only the current subtree can be discarded");
        if !self.subtrees[st].checkpoints.is_empty() {
            let root = self.subtrees[st].checkpoints[0];
            self.subtrees[st].checkpoints.clear();
            self.restore_to(root.trail);
            self.ts_current = root.timestamp;
            self.clear_queue();
        }
        self.current = self.subtrees[st].previous;
        self.subtrees[st].active = false;
    }

    /// Search for the next solution. Returns `false` and discards the
    /// subtree when the tree is exhausted; on `true`, every decision
    /// variable is bound and the next call resumes behind this solution.
    pub fn search(&mut self, st: SubtreeId) -> bool {
        assert!(self.is_current(st), "only the current subtree can be searched");

        if self.subtrees[st].inconsistent {
            self.discard(st);
            return false;
        }

        let mut x: Option<VarRef> = if self.subtrees[st].started {
            match self.backtrack(st) {
                Some(x) => Some(x),
                None => {
                    self.discard(st);
                    return false;
                }
            }
        } else {
            self.subtrees[st].started = true;
            None
        };

        loop {
            if x.map_or(true, |v| self.is_bound(v)) {
                x = self.select_variable(st);
                if x.is_none() {
                    // all decision variables bound: a solution
                    return true;
                }
            }
            let var = x.expect("variable selected");
            self.push_checkpoint(st, Some(var));
            if !self.label(var) || !self.run_propagate() {
                match self.backtrack(st) {
                    Some(y) => x = Some(y),
                    None => {
                        self.discard(st);
                        return false;
                    }
                }
            }
        }
    }

    /// Unbound variable with the best heuristic score; ties go to the first
    /// in declaration order.
    fn select_variable(&mut self, st: SubtreeId) -> Option<VarRef> {
        let n = self.subtrees[st].vars.len();
        let mut best: Option<(VarRef, f64)> = None;
        for i in 0..n {
            let y = self.subtrees[st].vars[i];
            if self.is_bound(y) {
                continue;
            }
            let score = match self.heuristic {
                SearchHeuristic::DomSize => self.size(y) as f64,
                SearchHeuristic::Degree => -(self.degree(y) as f64),
                SearchHeuristic::DynDegree => -(self.dyndegree(y) as f64),
                SearchHeuristic::DomDeg => self.size(y) as f64 / self.degree(y).max(1) as f64,
                SearchHeuristic::DomDynDeg => {
                    self.size(y) as f64 / self.dyndegree(y).max(1) as f64
                }
                SearchHeuristic::Random => self.prng.next_u64() as f64,
            };
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((y, score));
            }
        }
        best.map(|(y, _)| y)
    }

    fn push_checkpoint(&mut self, st: SubtreeId, var: Option<VarRef>) {
        let trail = self.checkpoint();
        let timestamp = self.ts_current;
        self.subtrees[st].checkpoints.push(SearchCheckpoint {
            trail,
            timestamp,
            var,
        });
    }

    /// Backtrack to the previous checkpoint, remove the failed choice and
    /// re-propagate; keeps unwinding while that fails. `None` when the whole
    /// subtree has been explored (the root checkpoint was restored).
    fn backtrack(&mut self, st: SubtreeId) -> Option<VarRef> {
        loop {
            self.stats.backtracks += 1;
            let chkp = self.subtrees[st].checkpoints.pop()?;
            self.restore_to(chkp.trail);
            self.ts_current = chkp.timestamp;
            self.clear_queue();
            let Some(x) = chkp.var else {
                // root restored: the subtree is exhausted
                return None;
            };
            if !self.unlabel(x) {
                continue;
            }
            if self.ts_current < self.ts_last_constraint && !self.post_static() {
                continue;
            }
            if !self.run_propagate() {
                continue;
            }
            return Some(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::propagator::{Priority, Propagator};

    /// x != y + offset, firing when either side is bound.
    struct Diff {
        x: VarRef,
        y: VarRef,
        offset: i64,
    }

    impl Propagator for Diff {
        fn priority(&self) -> Priority {
            Priority::High
        }

        fn propagate(&mut self, s: &mut Solver, _id: ConstraintId) -> bool {
            if s.is_bound(self.x) {
                let forbidden = s.value(self.x) as i64 - self.offset;
                if forbidden >= 0 {
                    return s.remove(self.y, forbidden as u32);
                }
            } else if s.is_bound(self.y) {
                let forbidden = s.value(self.y) as i64 + self.offset;
                if forbidden >= 0 {
                    return s.remove(self.x, forbidden as u32);
                }
            }
            true
        }
    }

    fn post_diff(s: &mut Solver, st: SubtreeId, x: VarRef, y: VarRef, offset: i64) {
        let c = s.subtree_add(st, Box::new(Diff { x, y, offset }));
        s.register_bind(x, c);
        s.register_bind(y, c);
    }

    #[test]
    fn two_vars_all_diff_solutions() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(0, 1);
        let y = s.add_discrete_var(0, 1);
        let st = s.add_search(&[x, y]);
        post_diff(&mut s, st, x, y, 0);
        s.activate(st);
        let mut solutions = Vec::new();
        while s.search(st) {
            solutions.push((s.value(x), s.value(y)));
        }
        solutions.sort_unstable();
        assert_eq!(solutions, vec![(0, 1), (1, 0)]);
        assert!(!s.is_active(st));
    }

    #[test]
    fn inconsistent_post_yields_no_solution() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(3, 3);
        let y = s.add_discrete_var(3, 3);
        let st = s.add_search(&[x, y]);
        post_diff(&mut s, st, x, y, 0);
        s.activate(st);
        assert!(!s.search(st));
    }

    #[test]
    fn subtree_restores_on_discard() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 4);
        let st = s.add_search(&[x]);
        s.activate(st);
        assert!(s.search(st));
        assert!(s.is_bound(x));
        s.discard(st);
        assert_eq!(s.size(x), 4);
        assert!(s.queues_empty());
    }

    #[test]
    fn search_enumerates_all_assignments() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 3);
        let y = s.add_discrete_var(1, 2);
        let st = s.add_search(&[x, y]);
        s.activate(st);
        let mut count = 0;
        while s.search(st) {
            count += 1;
        }
        assert_eq!(count, 6);
    }
}
