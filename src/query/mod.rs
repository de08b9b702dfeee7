//! Query-side constraints: the bridge between the store and the solver.
//!
//! The SPARQL parser and the compilation of patterns and filter expressions
//! are external collaborators; what they need is pinned here: triple
//! patterns over solver variables, the filter-expression interface with its
//! undefined-EBV convention, and the three posting entry points.

use std::rc::Rc;

use crate::solver::{ConstraintId, Priority, Propagator, Solver, VarRef};
use crate::store::Store;
use crate::types::{Triple, ValueId};

/// One component of a triple pattern: a fixed store value or a solver
/// variable ranging over value ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternTerm {
    Value(ValueId),
    Var(VarRef),
}

/// A triple pattern over value-id variables.
#[derive(Debug, Clone, Copy)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    fn terms(&self) -> [PatternTerm; 3] {
        [self.subject, self.predicate, self.object]
    }
}

/// Variable bindings handed to filter expressions.
#[derive(Debug, Default)]
pub struct Bindings {
    entries: Vec<(VarRef, ValueId)>,
}

impl Bindings {
    pub fn bind(&mut self, x: VarRef, v: ValueId) {
        if let Some(entry) = self.entries.iter_mut().find(|(y, _)| *y == x) {
            entry.1 = v;
        } else {
            self.entries.push((x, v));
        }
    }

    pub fn get(&self, x: VarRef) -> Option<ValueId> {
        self.entries.iter().find(|(y, _)| *y == x).map(|(_, v)| *v)
    }
}

/// A compiled filter expression.
///
/// `eval` returns the effective boolean value of the expression under the
/// given bindings; `None` is the undefined EBV (a type error somewhere in
/// the expression) and rejects the candidate binding.
pub trait FilterExpr {
    /// Variables the expression depends on.
    fn vars(&self) -> &[VarRef];

    fn eval(&self, store: &Store, bindings: &Bindings) -> Option<bool>;
}

// ----------------------------------------------------------------------
// Statement constraint
// ----------------------------------------------------------------------

/// Forward-checking propagator for one triple pattern: restricts every
/// unbound pattern variable to the component values of the triples matching
/// the bound part of the pattern.
pub struct StatementPropagator {
    store: Rc<Store>,
    pattern: TriplePattern,
}

impl StatementPropagator {
    pub fn new(store: Rc<Store>, pattern: TriplePattern) -> Self {
        StatementPropagator { store, pattern }
    }
}

impl Propagator for StatementPropagator {
    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn propagate(&mut self, s: &mut Solver, _id: ConstraintId) -> bool {
        let mut components = [0 as ValueId; 3];
        let mut unbound: Vec<(usize, VarRef)> = Vec::new();
        for (i, term) in self.pattern.terms().into_iter().enumerate() {
            match term {
                PatternTerm::Value(id) => components[i] = id,
                PatternTerm::Var(x) => {
                    if s.is_bound(x) {
                        components[i] = s.value(x);
                    } else {
                        unbound.push((i, x));
                    }
                }
            }
        }
        let pattern = Triple(components);

        if unbound.is_empty() {
            return self.store.count_triples(pattern) > 0;
        }

        for &(_, x) in &unbound {
            s.clear_marks(x);
        }
        for t in self.store.query_triples(pattern) {
            if unbound.iter().all(|&(i, x)| s.contains(x, t.0[i])) {
                for &(i, x) in &unbound {
                    s.mark(x, t.0[i]);
                }
            }
        }
        for &(_, x) in &unbound {
            if !s.restrict_to_marks(x) {
                return false;
            }
        }
        true
    }
}

/// Post a triple pattern as a static constraint.
pub fn post_statement(s: &mut Solver, store: &Rc<Store>, pattern: TriplePattern) -> ConstraintId {
    let c = s.add(Box::new(StatementPropagator::new(Rc::clone(store), pattern)));
    for term in pattern.terms() {
        if let PatternTerm::Var(x) = term {
            s.register_bind(x, c);
        }
    }
    c
}

// ----------------------------------------------------------------------
// Filter constraint
// ----------------------------------------------------------------------

/// Generic filter propagator: checks the expression once all its variables
/// are bound, and forward-checks the last unbound variable against every
/// candidate value.
pub struct FilterPropagator {
    store: Rc<Store>,
    expr: Box<dyn FilterExpr>,
}

impl FilterPropagator {
    pub fn new(store: Rc<Store>, expr: Box<dyn FilterExpr>) -> Self {
        FilterPropagator { store, expr }
    }
}

impl Propagator for FilterPropagator {
    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn propagate(&mut self, s: &mut Solver, _id: ConstraintId) -> bool {
        let vars = self.expr.vars().to_vec();
        let mut bindings = Bindings::default();
        let mut unbound: Option<VarRef> = None;
        for &x in &vars {
            if s.is_bound(x) {
                bindings.bind(x, s.value(x));
            } else if unbound.is_some() {
                // more than one unbound variable: nothing to do yet
                return true;
            } else {
                unbound = Some(x);
            }
        }
        match unbound {
            None => self.expr.eval(&self.store, &bindings) == Some(true),
            Some(x) => {
                s.clear_marks(x);
                let n = s.size(x) as usize;
                for idx in 0..n {
                    let v = s.domain(x)[idx];
                    bindings.bind(x, v);
                    if self.expr.eval(&self.store, &bindings) == Some(true) {
                        s.mark(x, v);
                    }
                }
                s.restrict_to_marks(x)
            }
        }
    }
}

/// Post a filter expression as a static constraint.
pub fn post_filter(
    s: &mut Solver,
    store: &Rc<Store>,
    expr: Box<dyn FilterExpr>,
) -> ConstraintId {
    let vars = expr.vars().to_vec();
    let c = s.add(Box::new(FilterPropagator::new(Rc::clone(store), expr)));
    for x in vars {
        s.register_bind(x, c);
    }
    c
}

// ----------------------------------------------------------------------
// Diff (SPARQL !=) constraint
// ----------------------------------------------------------------------

/// Operand of a diff constraint.
#[derive(Debug, Clone, Copy)]
pub enum DiffOperand {
    Var(VarRef),
    Const(ValueId),
}

/// `x != const`: the whole equivalence class of the constant is removed at
/// post time, after which the constraint is entailed.
struct ConstDiffPropagator {
    store: Rc<Store>,
    x: VarRef,
    value: ValueId,
}

impl Propagator for ConstDiffPropagator {
    fn priority(&self) -> Priority {
        Priority::High
    }

    fn post(&mut self, s: &mut Solver, id: ConstraintId) -> bool {
        let range = self.store.value_eq_class(self.value);
        for v in range.from..=range.to {
            if !s.remove(self.x, v) {
                return false;
            }
        }
        s.set_done(id);
        true
    }
}

/// `x != y`: fires when either side becomes bound and removes the bound
/// value's equivalence class from the other side.
struct VarDiffPropagator {
    store: Rc<Store>,
    x: VarRef,
    y: VarRef,
}

impl VarDiffPropagator {
    fn prune(&self, s: &mut Solver, bound: VarRef, other: VarRef) -> bool {
        let range = self.store.value_eq_class(s.value(bound));
        for v in range.from..=range.to {
            if !s.remove(other, v) {
                return false;
            }
        }
        true
    }
}

impl Propagator for VarDiffPropagator {
    fn priority(&self) -> Priority {
        Priority::High
    }

    fn propagate(&mut self, s: &mut Solver, id: ConstraintId) -> bool {
        match (s.is_bound(self.x), s.is_bound(self.y)) {
            (true, true) => {
                let vx = self.store.lookup_value(s.value(self.x));
                let vy = self.store.lookup_value(s.value(self.y));
                match (vx, vy) {
                    // a type error has undefined EBV and rejects the binding
                    (Ok(a), Ok(b)) => a.rdf_equals(&b) == Some(false),
                    _ => false,
                }
            }
            (true, false) => {
                if !self.prune(s, self.x, self.y) {
                    return false;
                }
                s.set_done(id);
                true
            }
            (false, true) => {
                if !self.prune(s, self.y, self.x) {
                    return false;
                }
                s.set_done(id);
                true
            }
            (false, false) => true,
        }
    }
}

struct ConstConstDiff {
    store: Rc<Store>,
    a: ValueId,
    b: ValueId,
}

impl Propagator for ConstConstDiff {
    fn priority(&self) -> Priority {
        Priority::High
    }

    fn post(&mut self, s: &mut Solver, id: ConstraintId) -> bool {
        let ok = match (self.store.lookup_value(self.a), self.store.lookup_value(self.b)) {
            (Ok(a), Ok(b)) => a.rdf_equals(&b) == Some(false),
            _ => false,
        };
        if ok {
            s.set_done(id);
        }
        ok
    }
}

/// Post a SPARQL `!=` between two operands. Constant/constant pairs are
/// decided immediately at post time.
pub fn post_diff(
    s: &mut Solver,
    store: &Rc<Store>,
    x: DiffOperand,
    y: DiffOperand,
) -> ConstraintId {
    match (x, y) {
        (DiffOperand::Var(x), DiffOperand::Var(y)) => {
            let c = s.add(Box::new(VarDiffPropagator {
                store: Rc::clone(store),
                x,
                y,
            }));
            s.register_bind(x, c);
            s.register_bind(y, c);
            c
        }
        (DiffOperand::Var(x), DiffOperand::Const(v))
        | (DiffOperand::Const(v), DiffOperand::Var(x)) => s.add(Box::new(ConstDiffPropagator {
            store: Rc::clone(store),
            x,
            value: v,
        })),
        (DiffOperand::Const(a), DiffOperand::Const(b)) => s.add(Box::new(ConstConstDiff {
            store: Rc::clone(store),
            a,
            b,
        })),
    }
}

/// Fail unconditionally; posted for patterns naming terms absent from the
/// store.
pub struct FailPropagator;

impl Propagator for FailPropagator {
    fn priority(&self) -> Priority {
        Priority::High
    }

    fn post(&mut self, _s: &mut Solver, _id: ConstraintId) -> bool {
        false
    }
}

/// Post an always-failing constraint.
pub fn post_fail(s: &mut Solver) -> ConstraintId {
    s.add(Box::new(FailPropagator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_overwrite() {
        let mut b = Bindings::default();
        let x = VarRef::Discrete(0);
        b.bind(x, 3);
        b.bind(x, 5);
        assert_eq!(b.get(x), Some(5));
        assert_eq!(b.get(VarRef::Discrete(1)), None);
    }
}
