//! castor - run a query against a store
//!
//! Usage: castor DB [QUERY]
//!
//! QUERY is a file of triple patterns, one per line, read from stdin when
//! omitted. Terms are `?var`, `<iri>`, `_:label` or literals; `FILTER
//! ?x != TERM` lines post inequality constraints. Solutions are printed one
//! per line.

use std::collections::BTreeMap;
use std::io::Read;
use std::process::exit;
use std::rc::Rc;
use std::time::Instant;

use castor::builder::ntriples;
use castor::query::{post_diff, post_statement, DiffOperand, PatternTerm, TriplePattern};
use castor::{Solver, Store, VarRef};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} DB [QUERY]", program);
    exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("castor");
    if args.len() < 2 || args.len() > 3 {
        usage(program);
    }
    let db_path = &args[1];

    let query_text = match args.get(2) {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Cannot read query '{}': {}", path, e);
                exit(2);
            }
        },
        None => {
            let mut text = String::new();
            if std::io::stdin().read_to_string(&mut text).is_err() {
                eprintln!("Cannot read query from stdin.");
                exit(2);
            }
            text
        }
    };

    match run(db_path, &query_text) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    }
}

/// A query term: a named variable or a constant RDF term.
enum QueryTerm {
    Var(String),
    Const(castor::Value),
}

struct Query {
    patterns: Vec<[QueryTerm; 3]>,
    filters: Vec<(String, QueryTerm)>,
}

fn parse_query(text: &str) -> Result<Query, String> {
    let mut query = Query {
        patterns: Vec::new(),
        filters: Vec::new(),
    };
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fail = |e: String| format!("line {}: {}", lineno + 1, e);
        if let Some(rest) = line.strip_prefix("FILTER") {
            let mut rest = rest.trim_start();
            let x = parse_query_term(&mut rest).map_err(fail)?;
            let QueryTerm::Var(name) = x else {
                return Err(format!("line {}: FILTER must start with a variable", lineno + 1));
            };
            let rest2 = rest.trim_start();
            let Some(mut rest3) = rest2.strip_prefix("!=") else {
                return Err(format!("line {}: only != filters are supported", lineno + 1));
            };
            let y = parse_query_term(&mut rest3).map_err(fail)?;
            query.filters.push((name, y));
        } else {
            let mut rest = line;
            let s = parse_query_term(&mut rest).map_err(fail)?;
            let p = parse_query_term(&mut rest).map_err(fail)?;
            let o = parse_query_term(&mut rest).map_err(fail)?;
            let tail = rest.trim();
            if !tail.is_empty() && tail != "." {
                return Err(format!("line {}: trailing input", lineno + 1));
            }
            query.patterns.push([s, p, o]);
        }
    }
    if query.patterns.is_empty() {
        return Err("query has no triple patterns".into());
    }
    Ok(query)
}

fn parse_query_term(rest: &mut &str) -> Result<QueryTerm, String> {
    let trimmed = rest.trim_start();
    if let Some(body) = trimmed.strip_prefix('?') {
        let end = body
            .find(|c: char| !c.is_alphanumeric() && c != '_')
            .unwrap_or(body.len());
        if end == 0 {
            return Err("empty variable name".into());
        }
        *rest = &body[end..];
        return Ok(QueryTerm::Var(body[..end].to_string()));
    }
    *rest = trimmed;
    ntriples::parse_term(rest).map(QueryTerm::Const)
}

fn run(db_path: &str, query_text: &str) -> castor::Result<()> {
    let query = parse_query(query_text).map_err(castor::Error::parse)?;

    let start = Instant::now();
    let store = Rc::new(Store::open(db_path)?);
    let open_time = start.elapsed();

    let mut solver = Solver::new();
    let nb_values = store.value_count();
    let mut vars: BTreeMap<String, VarRef> = BTreeMap::new();
    let mut var_of = |solver: &mut Solver, name: &str| -> VarRef {
        *vars
            .entry(name.to_string())
            .or_insert_with(|| solver.add_discrete_var(1, nb_values.max(1)))
    };

    // translate patterns and filters into constraints; a constant term
    // missing from the store makes the query unsatisfiable
    let mut possible = true;
    let mut patterns = Vec::new();
    for [s, p, o] in &query.patterns {
        let mut term = |t: &QueryTerm, solver: &mut Solver| match t {
            QueryTerm::Var(name) => PatternTerm::Var(var_of(solver, name)),
            QueryTerm::Const(value) => {
                let id = store.find_value_id(value);
                if id == 0 {
                    possible = false;
                }
                PatternTerm::Value(id)
            }
        };
        let pattern = TriplePattern {
            subject: term(s, &mut solver),
            predicate: term(p, &mut solver),
            object: term(o, &mut solver),
        };
        patterns.push(pattern);
    }

    if !possible || nb_values == 0 {
        println!("0 solutions in {:?}", start.elapsed());
        return Ok(());
    }

    for pattern in patterns {
        post_statement(&mut solver, &store, pattern);
    }
    for (name, operand) in &query.filters {
        let x = var_of(&mut solver, name);
        let y = match operand {
            QueryTerm::Var(other) => DiffOperand::Var(var_of(&mut solver, other)),
            QueryTerm::Const(value) => {
                let id = store.find_value_id(value);
                if id == 0 {
                    // nothing equals a term outside the store
                    continue;
                }
                DiffOperand::Const(id)
            }
        };
        post_diff(&mut solver, &store, DiffOperand::Var(x), y);
    }
    let names: Vec<(String, VarRef)> = vars.iter().map(|(n, &x)| (n.clone(), x)).collect();
    let refs: Vec<VarRef> = names.iter().map(|(_, x)| *x).collect();
    let st = solver.add_search(&refs);
    solver.activate(st);

    let mut solutions: u64 = 0;
    while solver.search(st) {
        solutions += 1;
        let mut line = String::new();
        for (name, x) in &names {
            let value = store.lookup_value(solver.value(*x))?;
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&format!("?{}={}", name, value));
        }
        println!("{}", line);
    }

    let stats = solver.stats();
    println!(
        "{} solutions in {:?} (open {:?}, {} backtracks, {} propagations)",
        solutions,
        start.elapsed(),
        open_time,
        stats.backtracks,
        stats.propagates
    );
    Ok(())
}
