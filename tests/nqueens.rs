//! Solver end-to-end test: n-queens through the public API, with the
//! classic decomposition into pairwise column and diagonal inequalities.

use castor::solver::{ConstraintId, Priority, Propagator, Solver, VarRef};

/// x != y + d, firing once either variable is bound.
struct Diff {
    x: VarRef,
    y: VarRef,
    d: i64,
}

impl Propagator for Diff {
    fn priority(&self) -> Priority {
        Priority::High
    }

    fn propagate(&mut self, s: &mut Solver, _id: ConstraintId) -> bool {
        if s.is_bound(self.x) {
            let forbidden = s.value(self.x) as i64 - self.d;
            if forbidden >= 0 {
                return s.remove(self.y, forbidden as u32);
            }
        } else if s.is_bound(self.y) {
            let forbidden = s.value(self.y) as i64 + self.d;
            if forbidden >= 0 {
                return s.remove(self.x, forbidden as u32);
            }
        }
        true
    }
}

fn post_diff(s: &mut Solver, x: VarRef, y: VarRef, d: i64) {
    let c = s.add(Box::new(Diff { x, y, d }));
    s.register_bind(x, c);
    s.register_bind(y, c);
}

/// Count the solutions of n-queens; queens[i] is the row of column i.
fn queens(n: usize) -> u64 {
    let mut s = Solver::new();
    let vars = s.add_discrete_vars(n, 0, (n - 1) as u32);
    for i in 0..n - 1 {
        for j in i + 1..n {
            post_diff(&mut s, vars[i], vars[j], 0);
            post_diff(&mut s, vars[i], vars[j], (j - i) as i64);
            post_diff(&mut s, vars[i], vars[j], -((j - i) as i64));
        }
    }
    // label larger rows first
    for &x in &vars {
        s.sort_domain_by(x, |a, b| b.cmp(&a));
    }

    let st = s.add_search(&vars);
    s.activate(st);
    let mut solutions = 0;
    while s.search(st) {
        for &x in &vars {
            assert!(s.is_bound(x));
        }
        solutions += 1;
    }
    solutions
}

#[test]
fn eight_queens_has_92_solutions() {
    assert_eq!(queens(8), 92);
}

#[test]
fn small_boards() {
    assert_eq!(queens(1), 1);
    assert_eq!(queens(2), 0);
    assert_eq!(queens(3), 0);
    assert_eq!(queens(4), 2);
    assert_eq!(queens(5), 10);
    assert_eq!(queens(6), 4);
}

#[test]
fn search_does_backtrack() {
    let mut s = Solver::new();
    let vars = s.add_discrete_vars(6, 0, 5);
    for i in 0..5 {
        for j in i + 1..6 {
            post_diff(&mut s, vars[i], vars[j], 0);
            post_diff(&mut s, vars[i], vars[j], (j - i) as i64);
            post_diff(&mut s, vars[i], vars[j], -((j - i) as i64));
        }
    }
    let st = s.add_search(&vars);
    s.activate(st);
    let mut count = 0;
    while s.search(st) {
        count += 1;
    }
    assert_eq!(count, 4);
    assert!(s.stats().backtracks > 0);
    assert!(s.stats().propagates > 0);
}
