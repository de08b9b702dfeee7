//! Sparse-set storage for discrete variables with auxiliary bounds.
//!
//! The domain has two loosely-coupled representations: the sparse set holds
//! the exact member values, while `min`/`max` are kept cheaply and are only
//! guaranteed tight when the variable is bound. Removal swaps the value to
//! the back of the live prefix, so the permutation never needs to be trailed;
//! restoring `size` (plus the bounds) restores the domain.

use crate::solver::propagator::ConstraintId;
use crate::solver::trail::Timestamp;

pub struct DiscreteVar {
    pub(crate) min_val: u32,
    pub(crate) max_val: u32,

    pub(crate) size: u32,
    /// Lower bound; may be non-tight while `size > 1`
    pub(crate) min: u32,
    /// Upper bound; may be non-tight while `size > 1`
    pub(crate) max: u32,

    /// `domain[0..size]` is the current domain
    pub(crate) domain: Vec<u32>,
    /// `map[v - min_val]` = index of `v` in `domain`
    pub(crate) map: Vec<u32>,

    /// Marked values are `domain[0..marked]`
    pub(crate) marked: u32,
    pub(crate) marked_min: u32,
    pub(crate) marked_max: u32,

    /// Last-save trail stamp
    pub(crate) stamp: Timestamp,

    pub(crate) ev_bind: Vec<ConstraintId>,
    pub(crate) ev_change: Vec<ConstraintId>,
    pub(crate) ev_bounds: Vec<ConstraintId>,
    pub(crate) degree: u32,
}

impl DiscreteVar {
    pub fn new(min_val: u32, max_val: u32) -> DiscreteVar {
        assert!(min_val <= max_val);
        let size = max_val - min_val + 1;
        DiscreteVar {
            min_val,
            max_val,
            size,
            min: min_val,
            max: max_val,
            domain: (min_val..=max_val).collect(),
            map: (0..size).collect(),
            marked: 0,
            marked_min: 0,
            marked_max: 0,
            stamp: 0,
            ev_bind: Vec::new(),
            ev_change: Vec::new(),
            ev_bounds: Vec::new(),
            degree: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn bound(&self) -> bool {
        self.size == 1
    }

    /// The bound value; only meaningful when `bound()`.
    pub fn value(&self) -> u32 {
        self.domain[0]
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Membership in the intersection of both representations.
    pub fn contains(&self, v: u32) -> bool {
        v >= self.min && v <= self.max && self.map[(v - self.min_val) as usize] < self.size
    }

    /// The current domain, unordered.
    pub fn domain(&self) -> &[u32] {
        &self.domain[..self.size as usize]
    }

    pub fn marked(&self) -> u32 {
        self.marked
    }

    /// Swap values at positions `i` and `j`, keeping the map consistent.
    pub(crate) fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        let vi = self.domain[i];
        let vj = self.domain[j];
        self.domain[i] = vj;
        self.domain[j] = vi;
        self.map[(vi - self.min_val) as usize] = j as u32;
        self.map[(vj - self.min_val) as usize] = i as u32;
    }

    /// Mark a value; marked values survive `restrict_to_marks`. Values outside
    /// the domain or already marked are ignored.
    pub fn mark(&mut self, v: u32) {
        if v < self.min || v > self.max {
            return;
        }
        let i = self.map[(v - self.min_val) as usize];
        if i >= self.size || i < self.marked {
            return;
        }
        self.swap(i as usize, self.marked as usize);
        if self.marked == 0 || v < self.marked_min {
            self.marked_min = v;
        }
        if self.marked == 0 || v > self.marked_max {
            self.marked_max = v;
        }
        self.marked += 1;
    }

    pub fn clear_marks(&mut self) {
        self.marked = 0;
    }

    /// Reorder the current domain; only valid before any checkpoint covers
    /// this variable, since the permutation itself is not trailed.
    pub fn sort_domain_by(&mut self, mut cmp: impl FnMut(u32, u32) -> std::cmp::Ordering) {
        let size = self.size as usize;
        self.domain[..size].sort_by(|&a, &b| cmp(a, b));
        for (i, &v) in self.domain[..size].iter().enumerate() {
            self.map[(v - self.min_val) as usize] = i as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_domain() {
        let x = DiscreteVar::new(2, 5);
        assert_eq!(x.size(), 4);
        assert!(!x.bound());
        assert!(x.contains(2) && x.contains(5) && !x.contains(6));
        assert_eq!(x.domain(), &[2, 3, 4, 5]);
    }

    #[test]
    fn marks_collect_in_prefix() {
        let mut x = DiscreteVar::new(1, 6);
        x.mark(4);
        x.mark(2);
        x.mark(4); // duplicate ignored
        assert_eq!(x.marked(), 2);
        let prefix: Vec<u32> = x.domain()[..2].to_vec();
        assert!(prefix.contains(&4) && prefix.contains(&2));
        assert_eq!(x.marked_min, 2);
        assert_eq!(x.marked_max, 4);
        x.clear_marks();
        assert_eq!(x.marked(), 0);
    }

    #[test]
    fn sorting_rebuilds_map() {
        let mut x = DiscreteVar::new(1, 4);
        x.sort_domain_by(|a, b| b.cmp(&a));
        assert_eq!(x.domain(), &[4, 3, 2, 1]);
        for v in 1..=4 {
            assert!(x.contains(v));
        }
    }
}
