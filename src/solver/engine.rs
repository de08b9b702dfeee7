//! The solver: variable arena, priority propagation queues, trail and
//! constraint bookkeeping.
//!
//! All domain operations return `true` on success and `false` when the
//! domain would become empty; the search loop turns `false` into a
//! backtrack. Every mutation writes at most one restore record per variable
//! per checkpoint window.

use std::collections::VecDeque;

use crate::solver::bounds::BoundsVar;
use crate::solver::discrete::DiscreteVar;
use crate::solver::propagator::{
    ConstraintId, ConstraintSlot, Propagator, QueueState, PRIORITY_COUNT,
};
use crate::solver::subtree::{SubtreeData, SubtreeId};
use crate::solver::small::SmallVar;
use crate::solver::trail::{Checkpoint, Trail, TrailEntry};
use crate::solver::VarRef;
use crate::util::random::Prng;

/// Variable-ordering heuristic used by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchHeuristic {
    /// Smallest domain size
    #[default]
    DomSize,
    /// Largest static degree
    Degree,
    /// Largest dynamic degree
    DynDegree,
    /// Smallest size/degree ratio
    DomDeg,
    /// Smallest size/dynamic-degree ratio
    DomDynDeg,
    Random,
}

/// Solver counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub backtracks: u64,
    pub subtrees: u64,
    pub posts: u64,
    pub propagates: u64,
}

/// Event list address, used to move a variable's subscriber list through the
/// queues without aliasing the variable.
#[derive(Clone, Copy)]
enum EventList {
    DiscBind(usize),
    DiscChange(usize),
    DiscBounds(usize),
    SmallBind(usize),
    SmallChange(usize),
    SmallBounds(usize),
    BoundsBind(usize),
    BoundsBounds(usize),
}

pub struct Solver {
    pub(crate) trail: Trail,

    pub(crate) discrete: Vec<DiscreteVar>,
    pub(crate) small: Vec<SmallVar>,
    pub(crate) bounds_vars: Vec<BoundsVar>,

    pub(crate) constraints: Vec<ConstraintSlot>,
    /// Ids of statically-posted constraints, in add order
    statics: Vec<ConstraintId>,
    queues: [VecDeque<ConstraintId>; PRIORITY_COUNT],

    pub(crate) subtrees: Vec<SubtreeData>,
    /// Currently active subtree
    pub(crate) current: Option<SubtreeId>,

    /// Timestamp of the static constraints reflected in the domains
    pub(crate) ts_current: u64,
    /// Timestamp of the latest added or refreshed static constraint
    pub(crate) ts_last_constraint: u64,

    pub(crate) heuristic: SearchHeuristic,
    pub(crate) prng: Prng,
    pub(crate) stats: Stats,
}

impl Solver {
    pub fn new() -> Solver {
        Solver {
            trail: Trail::new(),
            discrete: Vec::new(),
            small: Vec::new(),
            bounds_vars: Vec::new(),
            constraints: Vec::new(),
            statics: Vec::new(),
            queues: Default::default(),
            subtrees: Vec::new(),
            current: None,
            ts_current: 0,
            ts_last_constraint: 0,
            heuristic: SearchHeuristic::default(),
            prng: Prng::new(0x6a09e667f3bcc908),
            stats: Stats::default(),
        }
    }

    /// Select the variable-ordering heuristic; affects subsequent searches.
    pub fn set_heuristic(&mut self, heuristic: SearchHeuristic) {
        self.heuristic = heuristic;
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Variable construction
    // ------------------------------------------------------------------

    pub fn add_discrete_var(&mut self, min_val: u32, max_val: u32) -> VarRef {
        self.discrete.push(DiscreteVar::new(min_val, max_val));
        VarRef::Discrete(self.discrete.len() - 1)
    }

    /// `n` discrete variables sharing the same initial domain.
    pub fn add_discrete_vars(&mut self, n: usize, min_val: u32, max_val: u32) -> Vec<VarRef> {
        (0..n).map(|_| self.add_discrete_var(min_val, max_val)).collect()
    }

    pub fn add_small_var(&mut self, min_val: u32, max_val: u32) -> VarRef {
        self.small.push(SmallVar::new(min_val, max_val));
        VarRef::Small(self.small.len() - 1)
    }

    pub fn add_bounds_var(&mut self, min_val: u32, max_val: u32) -> VarRef {
        self.bounds_vars.push(BoundsVar::new(min_val, max_val));
        VarRef::Bounds(self.bounds_vars.len() - 1)
    }

    // ------------------------------------------------------------------
    // Variable inspection
    // ------------------------------------------------------------------

    pub fn size(&self, x: VarRef) -> u32 {
        match x {
            VarRef::Discrete(i) => self.discrete[i].size(),
            VarRef::Small(i) => self.small[i].size(),
            VarRef::Bounds(i) => self.bounds_vars[i].size(),
        }
    }

    pub fn is_bound(&self, x: VarRef) -> bool {
        match x {
            VarRef::Discrete(i) => self.discrete[i].bound(),
            VarRef::Small(i) => self.small[i].bound(),
            VarRef::Bounds(i) => self.bounds_vars[i].bound(),
        }
    }

    /// The value of a bound variable.
    pub fn value(&self, x: VarRef) -> u32 {
        debug_assert!(self.is_bound(x));
        match x {
            VarRef::Discrete(i) => self.discrete[i].value(),
            VarRef::Small(i) => self.small[i].value(),
            VarRef::Bounds(i) => self.bounds_vars[i].value(),
        }
    }

    pub fn min(&self, x: VarRef) -> u32 {
        match x {
            VarRef::Discrete(i) => self.discrete[i].min(),
            VarRef::Small(i) => self.small[i].min(),
            VarRef::Bounds(i) => self.bounds_vars[i].min(),
        }
    }

    pub fn max(&self, x: VarRef) -> u32 {
        match x {
            VarRef::Discrete(i) => self.discrete[i].max(),
            VarRef::Small(i) => self.small[i].max(),
            VarRef::Bounds(i) => self.bounds_vars[i].max(),
        }
    }

    pub fn contains(&self, x: VarRef, v: u32) -> bool {
        match x {
            VarRef::Discrete(i) => self.discrete[i].contains(v),
            VarRef::Small(i) => self.small[i].contains(v),
            VarRef::Bounds(i) => self.bounds_vars[i].contains(v),
        }
    }

    /// The sparse-set domain of a discrete variable, unordered.
    pub fn domain(&self, x: VarRef) -> &[u32] {
        match x {
            VarRef::Discrete(i) => self.discrete[i].domain(),
            _ => panic!("domain() requires a discrete variable"),
        }
    }

    /// Number of registered propagators.
    pub fn degree(&self, x: VarRef) -> u32 {
        match x {
            VarRef::Discrete(i) => self.discrete[i].degree,
            VarRef::Small(i) => self.small[i].degree,
            VarRef::Bounds(i) => self.bounds_vars[i].degree,
        }
    }

    /// Number of registered propagators that are not entailed.
    pub fn dyndegree(&self, x: VarRef) -> u32 {
        let count = |lists: &[&Vec<ConstraintId>]| {
            lists
                .iter()
                .flat_map(|l| l.iter())
                .filter(|&&c| !self.constraints[c].done)
                .count() as u32
        };
        match x {
            VarRef::Discrete(i) => {
                let v = &self.discrete[i];
                count(&[&v.ev_bind, &v.ev_change, &v.ev_bounds])
            }
            VarRef::Small(i) => {
                let v = &self.small[i];
                count(&[&v.ev_bind, &v.ev_change, &v.ev_bounds])
            }
            VarRef::Bounds(i) => {
                let v = &self.bounds_vars[i];
                count(&[&v.ev_bind, &v.ev_bounds])
            }
        }
    }

    // ------------------------------------------------------------------
    // Event registration
    // ------------------------------------------------------------------

    /// Register a constraint to the bind event. A constraint must not
    /// register twice for the same variable.
    pub fn register_bind(&mut self, x: VarRef, c: ConstraintId) {
        match x {
            VarRef::Discrete(i) => {
                self.discrete[i].ev_bind.push(c);
                self.discrete[i].degree += 1;
            }
            VarRef::Small(i) => {
                self.small[i].ev_bind.push(c);
                self.small[i].degree += 1;
            }
            VarRef::Bounds(i) => {
                self.bounds_vars[i].ev_bind.push(c);
                self.bounds_vars[i].degree += 1;
            }
        }
    }

    /// Register a constraint to the change event (discrete and small
    /// variables only).
    pub fn register_change(&mut self, x: VarRef, c: ConstraintId) {
        match x {
            VarRef::Discrete(i) => {
                self.discrete[i].ev_change.push(c);
                self.discrete[i].degree += 1;
            }
            VarRef::Small(i) => {
                self.small[i].ev_change.push(c);
                self.small[i].degree += 1;
            }
            VarRef::Bounds(_) => panic!("bounds variables have no change event"),
        }
    }

    /// Register a constraint to the bounds event.
    pub fn register_bounds(&mut self, x: VarRef, c: ConstraintId) {
        match x {
            VarRef::Discrete(i) => {
                self.discrete[i].ev_bounds.push(c);
                self.discrete[i].degree += 1;
            }
            VarRef::Small(i) => {
                self.small[i].ev_bounds.push(c);
                self.small[i].degree += 1;
            }
            VarRef::Bounds(i) => {
                self.bounds_vars[i].ev_bounds.push(c);
                self.bounds_vars[i].degree += 1;
            }
        }
    }

    // ------------------------------------------------------------------
    // Domain operations
    // ------------------------------------------------------------------

    /// Restrict a variable to a single value.
    pub fn bind(&mut self, x: VarRef, v: u32) -> bool {
        match x {
            VarRef::Discrete(i) => self.bind_disc(i, v),
            VarRef::Small(i) => self.bind_small(i, v),
            VarRef::Bounds(i) => self.bind_bounds(i, v),
        }
    }

    /// Remove a value from a variable's domain.
    pub fn remove(&mut self, x: VarRef, v: u32) -> bool {
        match x {
            VarRef::Discrete(i) => self.remove_disc(i, v),
            VarRef::Small(i) => self.remove_small(i, v),
            VarRef::Bounds(i) => self.remove_bounds(i, v),
        }
    }

    /// Remove all values below `v`.
    pub fn update_min(&mut self, x: VarRef, v: u32) -> bool {
        match x {
            VarRef::Discrete(i) => self.update_min_disc(i, v),
            VarRef::Small(i) => self.update_min_small(i, v),
            VarRef::Bounds(i) => self.update_min_bounds(i, v),
        }
    }

    /// Remove all values above `v`.
    pub fn update_max(&mut self, x: VarRef, v: u32) -> bool {
        match x {
            VarRef::Discrete(i) => self.update_max_disc(i, v),
            VarRef::Small(i) => self.update_max_small(i, v),
            VarRef::Bounds(i) => self.update_max_bounds(i, v),
        }
    }

    /// Mark a value a propagator wants to keep.
    pub fn mark(&mut self, x: VarRef, v: u32) {
        match x {
            VarRef::Discrete(i) => self.discrete[i].mark(v),
            VarRef::Small(i) => self.small[i].mark(v),
            VarRef::Bounds(_) => panic!("bounds variables have no marks"),
        }
    }

    pub fn clear_marks(&mut self, x: VarRef) {
        match x {
            VarRef::Discrete(i) => self.discrete[i].clear_marks(),
            VarRef::Small(i) => self.small[i].clear_marks(),
            VarRef::Bounds(_) => panic!("bounds variables have no marks"),
        }
    }

    /// Restrict a variable to its marked values, clearing the marks.
    pub fn restrict_to_marks(&mut self, x: VarRef) -> bool {
        match x {
            VarRef::Discrete(i) => self.restrict_to_marks_disc(i),
            VarRef::Small(i) => self.restrict_to_marks_small(i),
            VarRef::Bounds(_) => panic!("bounds variables have no marks"),
        }
    }

    /// Reorder a discrete variable's domain; the branching value is always
    /// `domain[0]`. Only valid before the search takes checkpoints over the
    /// variable, since the permutation is not trailed.
    pub fn sort_domain_by(
        &mut self,
        x: VarRef,
        cmp: impl FnMut(u32, u32) -> std::cmp::Ordering,
    ) {
        match x {
            VarRef::Discrete(i) => self.discrete[i].sort_domain_by(cmp),
            _ => panic!("sort_domain_by() requires a discrete variable"),
        }
    }

    /// Bind the branching value during labeling.
    pub fn label(&mut self, x: VarRef) -> bool {
        match x {
            VarRef::Discrete(i) => {
                // domain[0] may have been pruned only in the bounds
                // representation; physically drop such values first
                while self.discrete[i].size > 0 && !self.discrete[i].contains(self.discrete[i].domain[0]) {
                    let v = self.discrete[i].domain[0];
                    if !self.remove_disc(i, v) {
                        return false;
                    }
                }
                let v = self.discrete[i].domain[0];
                self.bind_disc(i, v)
            }
            VarRef::Small(i) => {
                let v = self.small[i].min();
                self.bind_small(i, v)
            }
            VarRef::Bounds(i) => {
                let v = self.bounds_vars[i].min;
                self.bind_bounds(i, v)
            }
        }
    }

    /// Remove the value `label` would choose; called after backtracking.
    pub fn unlabel(&mut self, x: VarRef) -> bool {
        match x {
            VarRef::Discrete(i) => {
                while self.discrete[i].size > 0 && !self.discrete[i].contains(self.discrete[i].domain[0]) {
                    let v = self.discrete[i].domain[0];
                    if !self.remove_disc(i, v) {
                        return false;
                    }
                }
                let v = self.discrete[i].domain[0];
                self.remove_disc(i, v)
            }
            VarRef::Small(i) => {
                let v = self.small[i].min();
                self.remove_small(i, v)
            }
            VarRef::Bounds(i) => {
                let v = self.bounds_vars[i].min;
                self.update_min_bounds(i, v + 1)
            }
        }
    }

    // ------------------------------------------------------------------
    // Discrete variable operations
    // ------------------------------------------------------------------

    fn save_disc(&mut self, i: usize) {
        let ts = self.trail.timestamp();
        let v = &mut self.discrete[i];
        if v.stamp != ts {
            self.trail.push(TrailEntry::Discrete {
                var: i,
                size: v.size,
                min: v.min,
                max: v.max,
            });
            v.stamp = ts;
        }
    }

    fn bind_disc(&mut self, i: usize, v: u32) -> bool {
        self.discrete[i].clear_marks();
        let var = &self.discrete[i];
        if v < var.min || v > var.max {
            return false;
        }
        let pos = var.map[(v - var.min_val) as usize];
        if pos >= var.size {
            return false;
        }
        if var.size == 1 {
            return true;
        }
        self.save_disc(i);
        let var = &mut self.discrete[i];
        var.swap(pos as usize, 0);
        var.size = 1;
        var.min = v;
        var.max = v;
        self.fire(EventList::DiscBounds(i));
        self.fire(EventList::DiscChange(i));
        self.fire(EventList::DiscBind(i));
        true
    }

    fn remove_disc(&mut self, i: usize, v: u32) -> bool {
        self.discrete[i].clear_marks();
        let var = &self.discrete[i];
        if v < var.min_val || v > var.max_val {
            return true;
        }
        if v == var.min && var.min + 1 == var.max {
            let other = var.max;
            return self.bind_disc(i, other);
        }
        if v == var.max && var.max == var.min + 1 {
            let other = var.min;
            return self.bind_disc(i, other);
        }
        let pos = var.map[(v - var.min_val) as usize];
        if pos >= var.size {
            return true;
        }
        match var.size {
            0 | 1 => false,
            2 => {
                let other = var.domain[1 - pos as usize];
                self.bind_disc(i, other)
            }
            _ => {
                self.save_disc(i);
                let var = &mut self.discrete[i];
                var.size -= 1;
                let last = var.size as usize;
                var.swap(pos as usize, last);
                let mut bounds_event = false;
                if v == var.min {
                    var.min += 1; // not a tight bound
                    bounds_event = true;
                }
                if v == var.max {
                    var.max -= 1; // not a tight bound
                    bounds_event = true;
                }
                if bounds_event {
                    self.fire(EventList::DiscBounds(i));
                }
                self.fire(EventList::DiscChange(i));
                true
            }
        }
    }

    fn restrict_to_marks_disc(&mut self, i: usize) -> bool {
        let var = &mut self.discrete[i];
        let m = var.marked;
        let mmin = var.marked_min;
        let mmax = var.marked_max;
        var.clear_marks();
        if m == 0 {
            return false;
        }
        if m != var.size {
            self.save_disc(i);
            let var = &mut self.discrete[i];
            var.size = m;
            let bounds_event = var.min != mmin || var.max != mmax;
            var.min = mmin;
            var.max = mmax;
            if bounds_event {
                self.fire(EventList::DiscBounds(i));
            }
            self.fire(EventList::DiscChange(i));
            if m == 1 {
                self.fire(EventList::DiscBind(i));
            }
        }
        true
    }

    fn update_min_disc(&mut self, i: usize, v: u32) -> bool {
        self.discrete[i].clear_marks();
        let var = &self.discrete[i];
        if v > var.max {
            false
        } else if v == var.max {
            self.bind_disc(i, v)
        } else if v > var.min {
            self.save_disc(i);
            self.discrete[i].min = v;
            self.fire(EventList::DiscChange(i));
            self.fire(EventList::DiscBounds(i));
            true
        } else {
            true
        }
    }

    fn update_max_disc(&mut self, i: usize, v: u32) -> bool {
        self.discrete[i].clear_marks();
        let var = &self.discrete[i];
        if v < var.min {
            false
        } else if v == var.min {
            self.bind_disc(i, v)
        } else if v < var.max {
            self.save_disc(i);
            self.discrete[i].max = v;
            self.fire(EventList::DiscChange(i));
            self.fire(EventList::DiscBounds(i));
            true
        } else {
            true
        }
    }

    // ------------------------------------------------------------------
    // Small variable operations
    // ------------------------------------------------------------------

    fn save_small(&mut self, i: usize) {
        let ts = self.trail.timestamp();
        let v = &mut self.small[i];
        if v.stamp != ts {
            self.trail.push(TrailEntry::Small {
                var: i,
                domain: v.domain,
            });
            v.stamp = ts;
        }
    }

    fn bind_small(&mut self, i: usize, v: u32) -> bool {
        self.small[i].clear_marks();
        if !self.small[i].contains(v) {
            return false;
        }
        if self.small[i].bound() {
            return true;
        }
        self.save_small(i);
        let var = &mut self.small[i];
        var.domain = 1 << (v - var.min_val);
        self.fire(EventList::SmallBounds(i));
        self.fire(EventList::SmallChange(i));
        self.fire(EventList::SmallBind(i));
        true
    }

    fn remove_small(&mut self, i: usize, v: u32) -> bool {
        self.small[i].clear_marks();
        if !self.small[i].contains(v) {
            return true;
        }
        self.save_small(i);
        let var = &mut self.small[i];
        let old_min = var.min();
        let old_max = var.max();
        var.domain &= !(1 << (v - var.min_val));
        if var.domain == 0 {
            return false;
        }
        let bound = var.bound();
        if v == old_min || v == old_max {
            self.fire(EventList::SmallBounds(i));
        }
        if bound {
            self.fire(EventList::SmallBind(i));
        }
        self.fire(EventList::SmallChange(i));
        true
    }

    fn restrict_to_marks_small(&mut self, i: usize) -> bool {
        let var = &mut self.small[i];
        let marked = var.marked;
        var.clear_marks();
        if marked == 0 {
            return false;
        }
        if marked == var.domain {
            return true;
        }
        self.save_small(i);
        let var = &mut self.small[i];
        let old_min = var.min();
        let old_max = var.max();
        var.domain = marked;
        let bound = var.bound();
        let new_min = var.min();
        let new_max = var.max();
        if bound && old_min != old_max {
            self.fire(EventList::SmallBind(i));
        }
        if old_min != new_min || old_max != new_max {
            self.fire(EventList::SmallBounds(i));
        }
        self.fire(EventList::SmallChange(i));
        true
    }

    fn update_min_small(&mut self, i: usize, v: u32) -> bool {
        self.small[i].clear_marks();
        let var = &self.small[i];
        if v <= var.min_val {
            return true;
        }
        if v > var.max_val {
            return false;
        }
        let mask = !((1u32 << (v - var.min_val)) - 1);
        let new = var.domain & mask;
        if new == var.domain {
            return true;
        }
        if new == 0 {
            return false;
        }
        self.save_small(i);
        self.small[i].domain = new;
        self.fire(EventList::SmallChange(i));
        self.fire(EventList::SmallBounds(i));
        if self.small[i].bound() {
            self.fire(EventList::SmallBind(i));
        }
        true
    }

    fn update_max_small(&mut self, i: usize, v: u32) -> bool {
        self.small[i].clear_marks();
        let var = &self.small[i];
        if v >= var.max_val {
            return true;
        }
        if v < var.min_val {
            return false;
        }
        let shift = v - var.min_val;
        let mask = ((1u32 << shift) - 1) | (1u32 << shift);
        let new = var.domain & mask;
        if new == var.domain {
            return true;
        }
        if new == 0 {
            return false;
        }
        self.save_small(i);
        self.small[i].domain = new;
        self.fire(EventList::SmallChange(i));
        self.fire(EventList::SmallBounds(i));
        if self.small[i].bound() {
            self.fire(EventList::SmallBind(i));
        }
        true
    }

    // ------------------------------------------------------------------
    // Bounds variable operations
    // ------------------------------------------------------------------

    fn save_bounds(&mut self, i: usize) {
        let ts = self.trail.timestamp();
        let v = &mut self.bounds_vars[i];
        if v.stamp != ts {
            self.trail.push(TrailEntry::Bounds {
                var: i,
                min: v.min,
                max: v.max,
            });
            v.stamp = ts;
        }
    }

    fn bind_bounds(&mut self, i: usize, v: u32) -> bool {
        let var = &self.bounds_vars[i];
        if v < var.min || v > var.max {
            return false;
        }
        if var.min == var.max {
            return true;
        }
        self.save_bounds(i);
        let var = &mut self.bounds_vars[i];
        var.min = v;
        var.max = v;
        self.fire(EventList::BoundsBounds(i));
        self.fire(EventList::BoundsBind(i));
        true
    }

    /// Bounds variables cannot represent holes; only edge values can be
    /// removed, inner removals are ignored.
    fn remove_bounds(&mut self, i: usize, v: u32) -> bool {
        let var = &self.bounds_vars[i];
        if v == var.min {
            self.update_min_bounds(i, v + 1)
        } else if v == var.max {
            self.update_max_bounds(i, v - 1)
        } else {
            true
        }
    }

    fn update_min_bounds(&mut self, i: usize, v: u32) -> bool {
        let var = &self.bounds_vars[i];
        if v > var.max {
            false
        } else if v == var.max {
            self.bind_bounds(i, v)
        } else if v > var.min {
            self.save_bounds(i);
            self.bounds_vars[i].min = v;
            self.fire(EventList::BoundsBounds(i));
            true
        } else {
            true
        }
    }

    fn update_max_bounds(&mut self, i: usize, v: u32) -> bool {
        let var = &self.bounds_vars[i];
        if v < var.min {
            false
        } else if v == var.min {
            self.bind_bounds(i, v)
        } else if v < var.max {
            self.save_bounds(i);
            self.bounds_vars[i].max = v;
            self.fire(EventList::BoundsBounds(i));
            true
        } else {
            true
        }
    }

    // ------------------------------------------------------------------
    // Constraints and propagation
    // ------------------------------------------------------------------

    /// Add a static constraint. It will be posted at the next subtree
    /// activation and re-posted after [`Solver::refresh`].
    pub fn add(&mut self, prop: Box<dyn Propagator>) -> ConstraintId {
        let id = self.constraints.len();
        self.ts_last_constraint += 1;
        self.constraints.push(ConstraintSlot {
            priority: prop.priority(),
            prop: Some(prop),
            state: QueueState::Unqueued,
            done: false,
            done_stamp: 0,
            parent: None,
            timestamp: self.ts_last_constraint,
        });
        self.statics.push(id);
        id
    }

    /// Force a static constraint to be re-posted at the next subtree
    /// activation.
    pub fn refresh(&mut self, c: ConstraintId) {
        self.ts_last_constraint += 1;
        self.constraints[c].timestamp = self.ts_last_constraint;
    }

    /// Mark a constraint entailed for the rest of the subtree; reversible.
    pub fn set_done(&mut self, c: ConstraintId) {
        let ts = self.trail.timestamp();
        let slot = &mut self.constraints[c];
        if slot.done_stamp != ts {
            self.trail.push(TrailEntry::Done {
                constraint: c,
                done: slot.done,
            });
            slot.done_stamp = ts;
        }
        slot.done = true;
    }

    pub fn is_done(&self, c: ConstraintId) -> bool {
        self.constraints[c].done
    }

    /// Move a variable's subscriber list through [`Solver::enqueue_ids`]
    /// without cloning it.
    fn fire(&mut self, list: EventList) {
        let ids = match list {
            EventList::DiscBind(i) => std::mem::take(&mut self.discrete[i].ev_bind),
            EventList::DiscChange(i) => std::mem::take(&mut self.discrete[i].ev_change),
            EventList::DiscBounds(i) => std::mem::take(&mut self.discrete[i].ev_bounds),
            EventList::SmallBind(i) => std::mem::take(&mut self.small[i].ev_bind),
            EventList::SmallChange(i) => std::mem::take(&mut self.small[i].ev_change),
            EventList::SmallBounds(i) => std::mem::take(&mut self.small[i].ev_bounds),
            EventList::BoundsBind(i) => std::mem::take(&mut self.bounds_vars[i].ev_bind),
            EventList::BoundsBounds(i) => std::mem::take(&mut self.bounds_vars[i].ev_bounds),
        };
        self.enqueue_ids(&ids);
        match list {
            EventList::DiscBind(i) => self.discrete[i].ev_bind = ids,
            EventList::DiscChange(i) => self.discrete[i].ev_change = ids,
            EventList::DiscBounds(i) => self.discrete[i].ev_bounds = ids,
            EventList::SmallBind(i) => self.small[i].ev_bind = ids,
            EventList::SmallChange(i) => self.small[i].ev_change = ids,
            EventList::SmallBounds(i) => self.small[i].ev_bounds = ids,
            EventList::BoundsBind(i) => self.bounds_vars[i].ev_bind = ids,
            EventList::BoundsBounds(i) => self.bounds_vars[i].ev_bounds = ids,
        }
    }

    /// Enqueue constraints for propagation. A constraint enters the queue
    /// only if it is not entailed, not already queued or running, and
    /// belongs to the active posting scope.
    fn enqueue_ids(&mut self, ids: &[ConstraintId]) {
        for &c in ids {
            let slot = &self.constraints[c];
            if slot.done || slot.state != QueueState::Unqueued {
                continue;
            }
            let in_scope = match slot.parent {
                None => slot.timestamp <= self.ts_current,
                Some(st) => self.current == Some(st),
            };
            if !in_scope {
                continue;
            }
            let p = slot.priority as usize;
            self.constraints[c].state = QueueState::Queued;
            self.queues[p].push_back(c);
        }
    }

    /// Post all static constraints newer than the current timestamp.
    pub(crate) fn post_static(&mut self) -> bool {
        let ts = self.ts_current;
        self.ts_current = self.ts_last_constraint;
        let to_post: Vec<ConstraintId> = self
            .statics
            .iter()
            .copied()
            .filter(|&c| self.constraints[c].timestamp > ts)
            .collect();
        for &c in &to_post {
            self.constraints[c].state = QueueState::Propagating;
        }
        for &c in &to_post {
            self.stats.posts += 1;
            let mut prop = self.constraints[c].prop.take().expect("propagator present");
            let ok = prop.post(self, c);
            self.constraints[c].prop = Some(prop);
            if !ok {
                // some constraints stay marked propagating; the caller
                // backtracks, restoring ts_current, and they will be
                // re-posted at the next activation
                return false;
            }
            self.constraints[c].state = QueueState::Unqueued;
        }
        self.run_propagate()
    }

    /// Post a subtree's local constraints, priority class by priority class.
    pub(crate) fn post_locals(&mut self, lists: &[Vec<ConstraintId>; PRIORITY_COUNT]) -> bool {
        for list in lists.iter() {
            for &c in list {
                self.constraints[c].state = QueueState::Propagating;
            }
        }
        for list in lists.iter() {
            for &c in list {
                self.stats.posts += 1;
                let mut prop = self.constraints[c].prop.take().expect("propagator present");
                let ok = prop.post(self, c);
                self.constraints[c].prop = Some(prop);
                if !ok {
                    return false;
                }
                self.constraints[c].state = QueueState::Unqueued;
            }
            if !self.run_propagate() {
                return false;
            }
        }
        true
    }

    /// Drain the queues to the propagation fixpoint. Higher priorities drain
    /// completely before lower ones get a turn. On failure the remaining
    /// queue content is left in place; the caller backtracks and clears it.
    pub(crate) fn run_propagate(&mut self) -> bool {
        'outer: loop {
            for p in 0..PRIORITY_COUNT {
                if let Some(c) = self.queues[p].pop_front() {
                    self.stats.propagates += 1;
                    self.constraints[c].state = QueueState::Propagating;
                    let mut prop = self.constraints[c].prop.take().expect("propagator present");
                    let ok = prop.propagate(self, c);
                    self.constraints[c].prop = Some(prop);
                    self.constraints[c].state = QueueState::Unqueued;
                    if !ok {
                        return false;
                    }
                    continue 'outer;
                }
            }
            return true;
        }
    }

    /// Empty all priority queues.
    pub(crate) fn clear_queue(&mut self) {
        for p in 0..PRIORITY_COUNT {
            while let Some(c) = self.queues[p].pop_front() {
                self.constraints[c].state = QueueState::Unqueued;
            }
        }
    }

    /// Whether any constraint is queued; used by tests.
    pub(crate) fn queues_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    // ------------------------------------------------------------------
    // Trail
    // ------------------------------------------------------------------

    /// Take a checkpoint of all trailable state.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.trail.checkpoint()
    }

    /// Restore all trailable state to a checkpoint.
    pub fn restore_to(&mut self, chkp: Checkpoint) {
        while self.trail.len() > chkp {
            match self.trail.pop().expect("trail entry") {
                TrailEntry::Discrete { var, size, min, max } => {
                    let v = &mut self.discrete[var];
                    v.size = size;
                    v.min = min;
                    v.max = max;
                    v.clear_marks();
                }
                TrailEntry::Small { var, domain } => {
                    let v = &mut self.small[var];
                    v.domain = domain;
                    v.clear_marks();
                }
                TrailEntry::Bounds { var, min, max } => {
                    let v = &mut self.bounds_vars[var];
                    v.min = min;
                    v.max = max;
                }
                TrailEntry::Done { constraint, done } => {
                    self.constraints[constraint].done = done;
                }
            }
        }
        self.trail.bump();
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_events_restore() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 5);
        let chkp = s.checkpoint();
        assert!(s.bind(x, 3));
        assert!(s.is_bound(x));
        assert_eq!(s.value(x), 3);
        s.restore_to(chkp);
        assert_eq!(s.size(x), 5);
        assert!(s.contains(x, 1) && s.contains(x, 5));
    }

    #[test]
    fn remove_down_to_bind() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 3);
        assert!(s.remove(x, 2));
        assert!(s.remove(x, 1));
        assert!(s.is_bound(x));
        assert_eq!(s.value(x), 3);
        assert!(!s.remove(x, 3));
    }

    #[test]
    fn update_bounds_are_lazy() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 10);
        assert!(s.update_min(x, 4));
        assert!(s.update_max(x, 7));
        assert_eq!(s.min(x), 4);
        assert_eq!(s.max(x), 7);
        // sparse set still holds all values; contains() intersects
        assert!(!s.contains(x, 2));
        assert!(s.contains(x, 5));
    }

    #[test]
    fn marks_restrict() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 6);
        s.mark(x, 2);
        s.mark(x, 5);
        assert!(s.restrict_to_marks(x));
        assert_eq!(s.size(x), 2);
        assert!(s.contains(x, 2) && s.contains(x, 5) && !s.contains(x, 3));
        assert_eq!(s.min(x), 2);
        assert_eq!(s.max(x), 5);
    }

    #[test]
    fn restrict_without_marks_fails() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 4);
        assert!(!s.restrict_to_marks(x));
    }

    #[test]
    fn small_var_bitops() {
        let mut s = Solver::new();
        let x = s.add_small_var(0, 8);
        assert!(s.remove(x, 0));
        assert_eq!(s.min(x), 1);
        assert!(s.update_max(x, 5));
        assert_eq!(s.max(x), 5);
        let chkp = s.checkpoint();
        assert!(s.bind(x, 4));
        assert!(s.is_bound(x));
        s.restore_to(chkp);
        assert_eq!(s.size(x), 5);
    }

    #[test]
    fn bounds_var_narrowing() {
        let mut s = Solver::new();
        let x = s.add_bounds_var(1, 9);
        assert!(s.update_min(x, 3));
        assert!(s.update_max(x, 4));
        assert!(!s.is_bound(x));
        assert!(s.unlabel(x));
        assert!(s.is_bound(x));
        assert_eq!(s.value(x), 4);
    }

    #[test]
    fn one_save_per_checkpoint_window() {
        let mut s = Solver::new();
        let x = s.add_discrete_var(1, 100);
        let chkp = s.checkpoint();
        for v in 1..50 {
            assert!(s.remove(x, v));
        }
        // a single restore record covers all 49 removals
        assert_eq!(s.trail.len(), chkp + 1);
        s.restore_to(chkp);
        assert_eq!(s.size(x), 100);
    }
}
