//! Bitset storage for variables with at most 32 values.

use crate::solver::propagator::ConstraintId;
use crate::solver::trail::Timestamp;

pub struct SmallVar {
    pub(crate) min_val: u32,
    pub(crate) max_val: u32,

    /// Bit `i` corresponds to value `min_val + i`
    pub(crate) domain: u32,
    /// Mark bitset
    pub(crate) marked: u32,

    pub(crate) stamp: Timestamp,

    pub(crate) ev_bind: Vec<ConstraintId>,
    pub(crate) ev_change: Vec<ConstraintId>,
    pub(crate) ev_bounds: Vec<ConstraintId>,
    pub(crate) degree: u32,
}

impl SmallVar {
    pub fn new(min_val: u32, max_val: u32) -> SmallVar {
        assert!(min_val <= max_val && max_val - min_val < 32);
        let width = max_val - min_val;
        let domain = if width == 31 {
            u32::MAX
        } else {
            (1u32 << (width + 1)) - 1
        };
        SmallVar {
            min_val,
            max_val,
            domain,
            marked: 0,
            stamp: 0,
            ev_bind: Vec::new(),
            ev_change: Vec::new(),
            ev_bounds: Vec::new(),
            degree: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.domain.count_ones()
    }

    pub fn bound(&self) -> bool {
        self.size() == 1
    }

    pub fn min(&self) -> u32 {
        debug_assert!(self.domain != 0);
        self.min_val + self.domain.trailing_zeros()
    }

    pub fn max(&self) -> u32 {
        debug_assert!(self.domain != 0);
        self.min_val + 31 - self.domain.leading_zeros()
    }

    pub fn value(&self) -> u32 {
        self.min()
    }

    pub fn contains(&self, v: u32) -> bool {
        v >= self.min_val && v <= self.max_val && self.domain & (1 << (v - self.min_val)) != 0
    }

    pub fn mark(&mut self, v: u32) {
        if self.contains(v) {
            self.marked |= 1 << (v - self.min_val);
        }
    }

    pub fn clear_marks(&mut self) {
        self.marked = 0;
    }

    /// Values of the current domain, ascending.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        let min_val = self.min_val;
        let domain = self.domain;
        (0..32u32)
            .filter(move |i| domain & (1 << i) != 0)
            .map(move |i| min_val + i)
    }
}
