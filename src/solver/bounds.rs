//! Bounds-only variable storage: the domain is the whole interval
//! `min..=max`. Fires bind and bounds events only, never change.

use crate::solver::propagator::ConstraintId;
use crate::solver::trail::Timestamp;

pub struct BoundsVar {
    pub(crate) min: u32,
    pub(crate) max: u32,

    pub(crate) stamp: Timestamp,

    pub(crate) ev_bind: Vec<ConstraintId>,
    pub(crate) ev_bounds: Vec<ConstraintId>,
    pub(crate) degree: u32,
}

impl BoundsVar {
    pub fn new(min: u32, max: u32) -> BoundsVar {
        assert!(min <= max);
        BoundsVar {
            min,
            max,
            stamp: 0,
            ev_bind: Vec::new(),
            ev_bounds: Vec::new(),
            degree: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.max - self.min + 1
    }

    pub fn bound(&self) -> bool {
        self.min == self.max
    }

    pub fn value(&self) -> u32 {
        self.min
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, v: u32) -> bool {
        v >= self.min && v <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_semantics() {
        let x = BoundsVar::new(5, 9);
        assert_eq!(x.size(), 5);
        assert!(x.contains(5) && x.contains(9) && !x.contains(4));
        assert!(!x.bound());
        let y = BoundsVar::new(3, 3);
        assert!(y.bound());
        assert_eq!(y.value(), 3);
    }
}
