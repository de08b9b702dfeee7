//! End-to-end tests: build a small store, reopen it and check the reader
//! contracts against the builder's input.

use std::rc::Rc;

use castor::builder::StoreBuilder;
use castor::model::{XSD_DECIMAL, XSD_INTEGER, XSD_STRING};
use castor::query::{
    post_diff, post_statement, Bindings, DiffOperand, FilterExpr, PatternTerm, TriplePattern,
};
use castor::{Solver, Store, Triple, Value, VarRef};

fn iri(suffix: &str) -> Value {
    Value::iri(format!("http://example.org/{}", suffix))
}

/// Build the three-triple fixture store: (a p b), (a p c), (a q b).
fn small_store(dir: &std::path::Path) -> Store {
    let path = dir.join("small.db");
    let mut b = StoreBuilder::create(&path).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &iri("b")).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &iri("c")).unwrap();
    b.add_triple(&iri("a"), &iri("q"), &iri("b")).unwrap();
    // duplicates are eliminated
    b.add_triple(&iri("a"), &iri("p"), &iri("b")).unwrap();
    b.finish().unwrap();
    Store::open(&path).unwrap()
}

fn id_of(store: &Store, value: &Value) -> u32 {
    let id = store.find_value_id(value);
    assert!(id > 0, "{} should be interned", value);
    id
}

#[test]
fn full_scan_is_spo_sorted_and_duplicate_free() {
    let dir = tempfile::tempdir().unwrap();
    let store = small_store(dir.path());

    assert_eq!(store.triples_count(), 3);
    assert_eq!(store.count_triples(Triple::new(0, 0, 0)), 3);

    let triples: Vec<Triple> = store.query_triples(Triple::new(0, 0, 0)).collect();
    assert_eq!(triples.len(), 3);
    let mut sorted = triples.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(triples, sorted, "scan must be SPO-sorted and duplicate-free");

    // the scan equals the raw table contents
    let mut raw: Vec<Triple> = (0..store.triples_count())
        .map(|i| store.raw_triple(i))
        .collect();
    raw.sort();
    assert_eq!(triples, raw);
}

#[test]
fn bound_subject_scan_in_predicate_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = small_store(dir.path());
    let a = id_of(&store, &iri("a"));
    let p = id_of(&store, &iri("p"));
    let q = id_of(&store, &iri("q"));
    let b = id_of(&store, &iri("b"));
    let c = id_of(&store, &iri("c"));

    let triples: Vec<Triple> = store.query_triples(Triple::new(a, 0, 0)).collect();
    assert_eq!(
        triples,
        vec![
            Triple::new(a, p, b),
            Triple::new(a, p, c),
            Triple::new(a, q, b),
        ]
    );
}

#[test]
fn pattern_scans_match_raw_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let store = small_store(dir.path());
    let a = id_of(&store, &iri("a"));
    let p = id_of(&store, &iri("p"));
    let b = id_of(&store, &iri("b"));

    let raw: Vec<Triple> = (0..store.triples_count())
        .map(|i| store.raw_triple(i))
        .collect();

    for pattern in [
        Triple::new(a, 0, 0),
        Triple::new(0, p, 0),
        Triple::new(0, 0, b),
        Triple::new(a, p, 0),
        Triple::new(a, 0, b),
        Triple::new(0, p, b),
        Triple::new(a, p, b),
    ] {
        let order = store.query_triples(pattern).order();
        let expected: Vec<Triple> = {
            let mut matching: Vec<Triple> = raw
                .iter()
                .copied()
                .filter(|t| {
                    (pattern.subject() == 0 || t.subject() == pattern.subject())
                        && (pattern.predicate() == 0 || t.predicate() == pattern.predicate())
                        && (pattern.object() == 0 || t.object() == pattern.object())
                })
                .collect();
            matching.sort_by_key(|t| order.to_key(*t));
            matching
        };
        let got: Vec<Triple> = store.query_triples(pattern).collect();
        assert_eq!(got, expected, "pattern {:?}", pattern);
        assert_eq!(
            store.count_triples(pattern) as usize,
            expected.len(),
            "count for pattern {:?}",
            pattern
        );
    }
}

#[test]
fn aggregated_counts_match_scans() {
    let dir = tempfile::tempdir().unwrap();
    let store = small_store(dir.path());
    let a = id_of(&store, &iri("a"));
    let p = id_of(&store, &iri("p"));
    let b = id_of(&store, &iri("b"));

    assert_eq!(store.count_triples(Triple::new(a, p, 0)), 2);
    assert_eq!(store.count_triples(Triple::new(a, 0, b)), 2);
    assert_eq!(store.count_triples(Triple::new(0, p, b)), 1);
    assert_eq!(store.count_triples(Triple::new(a, 0, 0)), 3);
    assert_eq!(store.count_triples(Triple::new(0, p, 0)), 2);
    assert_eq!(store.count_triples(Triple::new(0, 0, b)), 2);
    assert_eq!(store.count_triples(Triple::new(a, p, b)), 1);
    assert_eq!(store.count_triples(Triple::new(b, p, a)), 0);
}

#[test]
fn strings_and_values_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = small_store(dir.path());

    for id in 1..=store.string_count() {
        let s = store.lookup_string(id).unwrap();
        assert_eq!(store.find_string(s.as_bytes()), id);
    }
    assert_eq!(store.find_string(b"no such string"), 0);

    for id in 1..=store.value_count() {
        let value = store.lookup_value(id).unwrap();
        assert_eq!(value.id, id);
        let mut probe = value.clone();
        probe.id = 0;
        assert_eq!(store.find_value_id(&probe), id);
        // every value is inside its own equivalence class
        let class = store.value_eq_class(id);
        assert!(class.contains(id));
    }
    assert_eq!(store.find_value_id(&iri("missing")), 0);
}

#[test]
fn integer_and_decimal_share_equivalence_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eq.db");
    let mut b = StoreBuilder::create(&path).unwrap();
    let one_int = Value::typed("1", XSD_INTEGER);
    let one_dec = Value::typed("1.0", XSD_DECIMAL);
    let two_int = Value::typed("2", XSD_INTEGER);
    b.add_triple(&iri("a"), &iri("p"), &one_int).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &one_dec).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &two_int).unwrap();
    b.finish().unwrap();
    let store = Store::open(&path).unwrap();

    let int_id = id_of(&store, &one_int);
    let dec_id = id_of(&store, &one_dec);
    let two_id = id_of(&store, &two_int);
    assert_ne!(int_id, dec_id);

    let class = store.value_eq_class(int_id);
    assert_eq!(class, store.value_eq_class(dec_id));
    assert!(class.contains(int_id) && class.contains(dec_id));
    assert!(!class.contains(two_id));

    // bracketing an uninterned equivalent value finds the same class
    let probe = Value::typed("1.00", XSD_DECIMAL);
    assert_eq!(store.value_eq_class_of(&probe), class);

    // an uninterned value between classes yields an empty glb/lub range
    let probe = Value::typed("1.5", XSD_DECIMAL);
    let range = store.value_eq_class_of(&probe);
    assert!(range.is_empty());
    assert_eq!(range.from - 1, class.to);
    assert_eq!(range.to + 1, store.value_eq_class(two_id).from);
}

#[test]
fn plain_and_xsd_string_share_equivalence_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("streq.db");
    let mut b = StoreBuilder::create(&path).unwrap();
    let plain_x = Value::plain("x");
    let typed_x = Value::typed("x", XSD_STRING);
    let typed_y = Value::typed("y", XSD_STRING);
    b.add_triple(&iri("a"), &iri("p"), &plain_x).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &typed_x).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &typed_y).unwrap();
    b.finish().unwrap();
    let store = Store::open(&path).unwrap();

    let plain_id = id_of(&store, &plain_x);
    let typed_id = id_of(&store, &typed_x);
    let other_id = id_of(&store, &typed_y);
    assert_ne!(plain_id, typed_id);

    let class = store.value_eq_class(plain_id);
    assert_eq!(class, store.value_eq_class(typed_id));
    assert!(class.contains(plain_id) && class.contains(typed_id));
    assert!(!class.contains(other_id));

    // bracketing an uninterned value finds the class through either kind
    assert_eq!(store.value_eq_class_of(&Value::plain("x")), class);
    assert_eq!(
        store.value_eq_class_of(&Value::typed("x", XSD_STRING)),
        class
    );
    // "y" has no plain twin: the plain-side probe must cross over to the
    // xsd:string range
    let y_class = store.value_eq_class(other_id);
    assert_eq!(store.value_eq_class_of(&Value::plain("y")), y_class);

    // a lexical absent from both kinds yields an empty glb/lub range
    assert!(store
        .value_eq_class_of(&Value::typed("w", XSD_STRING))
        .is_empty());
}

#[test]
fn categories_are_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cat.db");
    let mut b = StoreBuilder::create(&path).unwrap();
    b.add_triple(&Value::blank("x"), &iri("p"), &Value::plain("hello"))
        .unwrap();
    b.add_triple(&iri("a"), &iri("p"), &Value::plain_lang("hi", "en"))
        .unwrap();
    b.add_triple(&iri("a"), &iri("p"), &Value::typed("7", XSD_INTEGER))
        .unwrap();
    b.finish().unwrap();
    let store = Store::open(&path).unwrap();

    for id in 1..=store.value_count() {
        let value = store.lookup_value(id).unwrap();
        assert_eq!(store.value_category(id), value.category, "value {}", id);
        let range = store.category_values(value.category);
        assert!(range.contains(id));
    }
}

#[test]
fn solver_answers_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let store = Rc::new(small_store(dir.path()));
    let a = id_of(&store, &iri("a"));
    let p = id_of(&store, &iri("p"));
    let b = id_of(&store, &iri("b"));
    let c = id_of(&store, &iri("c"));

    // ?x ?y: (a p ?o) -> o in {b, c}
    let mut solver = Solver::new();
    let o = solver.add_discrete_var(1, store.value_count());
    post_statement(
        &mut solver,
        &store,
        TriplePattern {
            subject: PatternTerm::Value(a),
            predicate: PatternTerm::Value(p),
            object: PatternTerm::Var(o),
        },
    );
    let st = solver.add_search(&[o]);
    solver.activate(st);
    let mut solutions = Vec::new();
    while solver.search(st) {
        solutions.push(solver.value(o));
    }
    solutions.sort_unstable();
    let mut expected = vec![b, c];
    expected.sort_unstable();
    assert_eq!(solutions, expected);
}

#[test]
fn diff_against_constant_prunes_on_post() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diff.db");
    let mut b = StoreBuilder::create(&path).unwrap();
    let one_int = Value::typed("1", XSD_INTEGER);
    let one_dec = Value::typed("1.0", XSD_DECIMAL);
    b.add_triple(&iri("a"), &iri("p"), &one_int).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &one_dec).unwrap();
    b.add_triple(&iri("a"), &iri("p"), &Value::typed("2", XSD_INTEGER))
        .unwrap();
    b.finish().unwrap();
    let store = Rc::new(Store::open(&path).unwrap());

    let int_id = id_of(&store, &one_int);
    let dec_id = id_of(&store, &one_dec);

    let mut solver = Solver::new();
    let x = solver.add_discrete_var(1, store.value_count());
    post_diff(
        &mut solver,
        &store,
        DiffOperand::Var(x),
        DiffOperand::Const(int_id),
    );
    let st = solver.add_search(&[x]);
    solver.activate(st);

    // the whole equivalence class vanished right after activation
    assert!(!solver.contains(x, int_id));
    assert!(!solver.contains(x, dec_id));
    solver.discard(st);
}

#[test]
fn binary_diff_filters_solutions() {
    let dir = tempfile::tempdir().unwrap();
    let store = Rc::new(small_store(dir.path()));
    let a = id_of(&store, &iri("a"));
    let p = id_of(&store, &iri("p"));
    let q = id_of(&store, &iri("q"));
    let b = id_of(&store, &iri("b"));
    let c = id_of(&store, &iri("c"));

    // (a ?r ?o) with ?r != ?o: every pair is distinct here, so all three
    // rows survive; with ?o != <b> only (p, c) remains
    let mut solver = Solver::new();
    let r = solver.add_discrete_var(1, store.value_count());
    let o = solver.add_discrete_var(1, store.value_count());
    post_statement(
        &mut solver,
        &store,
        TriplePattern {
            subject: PatternTerm::Value(a),
            predicate: PatternTerm::Var(r),
            object: PatternTerm::Var(o),
        },
    );
    post_diff(&mut solver, &store, DiffOperand::Var(r), DiffOperand::Var(o));
    post_diff(&mut solver, &store, DiffOperand::Var(o), DiffOperand::Const(b));
    let st = solver.add_search(&[r, o]);
    solver.activate(st);
    let mut rows = Vec::new();
    while solver.search(st) {
        rows.push((solver.value(r), solver.value(o)));
    }
    assert_eq!(rows, vec![(p, c)]);
    let _ = q;
}

/// Filter keeping bindings different from one fixed value.
struct NotValue {
    vars: Vec<VarRef>,
    forbidden: u32,
}

impl FilterExpr for NotValue {
    fn vars(&self) -> &[VarRef] {
        &self.vars
    }

    fn eval(&self, store: &Store, bindings: &Bindings) -> Option<bool> {
        let bound = bindings.get(self.vars[0])?;
        let a = store.lookup_value(bound).ok()?;
        let b = store.lookup_value(self.forbidden).ok()?;
        a.rdf_equals(&b).map(|eq| !eq)
    }
}

#[test]
fn filter_expression_rejects_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let store = Rc::new(small_store(dir.path()));
    let a = id_of(&store, &iri("a"));
    let p = id_of(&store, &iri("p"));
    let b = id_of(&store, &iri("b"));
    let c = id_of(&store, &iri("c"));

    let mut solver = Solver::new();
    let o = solver.add_discrete_var(1, store.value_count());
    post_statement(
        &mut solver,
        &store,
        TriplePattern {
            subject: PatternTerm::Value(a),
            predicate: PatternTerm::Value(p),
            object: PatternTerm::Var(o),
        },
    );
    castor::query::post_filter(
        &mut solver,
        &store,
        Box::new(NotValue {
            vars: vec![o],
            forbidden: b,
        }),
    );
    let st = solver.add_search(&[o]);
    solver.activate(st);
    let mut solutions = Vec::new();
    while solver.search(st) {
        solutions.push(solver.value(o));
    }
    assert_eq!(solutions, vec![c]);
}

#[test]
fn cache_counts_fetches() {
    let dir = tempfile::tempdir().unwrap();
    let store = small_store(dir.path());
    let before = store.cache_hits() + store.cache_misses();
    let _ = store.query_triples(Triple::new(0, 0, 0)).count();
    let _ = store.query_triples(Triple::new(0, 0, 0)).count();
    let after = store.cache_hits() + store.cache_misses();
    assert!(after > before);
    assert!(store.cache_hits() > 0, "second scan must hit the cache");
}

#[test]
fn corrupt_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.db");
    std::fs::write(&path, vec![0u8; 16384]).unwrap();
    let err = Store::open(&path).unwrap_err();
    assert_eq!(err.code(), castor::ErrorCode::Corrupt);

    let missing = Store::open(dir.path().join("none.db"));
    assert!(missing.is_err());
}
