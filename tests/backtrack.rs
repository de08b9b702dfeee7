//! Randomized trail correctness: any sequence of domain operations between
//! a checkpoint and its restore leaves every variable exactly as it was
//! when the checkpoint was taken, including nested checkpoints.

use castor::solver::Solver;
use castor::util::random::Prng;
use castor::VarRef;

const LO: u32 = 1;
const HI: u32 = 24;

/// Observable state of a variable: size, bounds, and membership per value.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    size: u32,
    min: u32,
    max: u32,
    members: Vec<bool>,
}

fn snapshot(s: &Solver, x: VarRef) -> Snapshot {
    Snapshot {
        size: s.size(x),
        min: s.min(x),
        max: s.max(x),
        members: (LO..=HI + 8).map(|v| s.contains(x, v)).collect(),
    }
}

fn random_op(s: &mut Solver, x: VarRef, rng: &mut Prng) {
    let v = LO + rng.next_below((HI - LO + 8) as u64) as u32;
    match rng.next_below(6) {
        0 => {
            // only bind into a non-empty outcome
            if s.contains(x, v) {
                let _ = s.bind(x, v);
            }
        }
        1 => {
            if s.size(x) > 1 {
                let _ = s.remove(x, v);
            }
        }
        2 => {
            if v <= s.max(x) {
                let _ = s.update_min(x, v);
            }
        }
        3 => {
            if v >= s.min(x) {
                let _ = s.update_max(x, v);
            }
        }
        4 => {
            if matches!(x, VarRef::Discrete(_) | VarRef::Small(_)) {
                s.mark(x, v);
                s.mark(x, LO + rng.next_below((HI - LO) as u64) as u32);
                let _ = s.restrict_to_marks(x);
            }
        }
        _ => {
            if matches!(x, VarRef::Discrete(_) | VarRef::Small(_)) {
                s.clear_marks(x);
            }
        }
    }
}

#[test]
fn restore_recovers_checkpointed_state() {
    let mut s = Solver::new();
    let vars = vec![
        s.add_discrete_var(LO, HI),
        s.add_discrete_var(LO, HI),
        s.add_small_var(LO, LO + 20),
        s.add_bounds_var(LO, HI),
    ];
    let mut rng = Prng::new(0xc0ffee);

    for _round in 0..200 {
        let before: Vec<Snapshot> = vars.iter().map(|&x| snapshot(&s, x)).collect();
        let chkp = s.checkpoint();

        for _ in 0..10 {
            let x = vars[rng.next_below(vars.len() as u64) as usize];
            random_op(&mut s, x, &mut rng);
        }

        // nested checkpoint window
        let inner_before: Vec<Snapshot> = vars.iter().map(|&x| snapshot(&s, x)).collect();
        let inner = s.checkpoint();
        for _ in 0..6 {
            let x = vars[rng.next_below(vars.len() as u64) as usize];
            random_op(&mut s, x, &mut rng);
        }
        s.restore_to(inner);
        let inner_after: Vec<Snapshot> = vars.iter().map(|&x| snapshot(&s, x)).collect();
        assert_eq!(inner_before, inner_after, "inner restore mismatch");

        s.restore_to(chkp);
        let after: Vec<Snapshot> = vars.iter().map(|&x| snapshot(&s, x)).collect();
        assert_eq!(before, after, "outer restore mismatch");
    }
}

#[test]
fn operations_track_a_reference_set_model() {
    // the discrete variable against a straightforward set model; bounds are
    // compared through contains() only, since min/max may be non-tight
    let mut s = Solver::new();
    let x = s.add_discrete_var(LO, HI);
    let mut model: Vec<u32> = (LO..=HI).collect();
    let mut rng = Prng::new(42);

    for _ in 0..500 {
        if model.len() <= 1 {
            break;
        }
        let v = LO + rng.next_below((HI - LO + 1) as u64) as u32;
        match rng.next_below(4) {
            0 => {
                if model.contains(&v) {
                    assert!(s.bind(x, v));
                    model.retain(|&m| m == v);
                }
            }
            1 => {
                if model.len() > 1 || !model.contains(&v) {
                    assert!(s.remove(x, v));
                    if model.len() > 1 {
                        model.retain(|&m| m != v);
                    }
                }
            }
            2 => {
                if model.iter().any(|&m| m >= v) {
                    assert!(s.update_min(x, v));
                    model.retain(|&m| m >= v);
                }
            }
            _ => {
                if model.iter().any(|&m| m <= v) {
                    assert!(s.update_max(x, v));
                    model.retain(|&m| m <= v);
                }
            }
        }
        for v in LO..=HI {
            assert_eq!(
                s.contains(x, v),
                model.contains(&v),
                "membership diverged at {}",
                v
            );
        }
        assert!(s.size(x) as usize >= model.len());
    }
}
