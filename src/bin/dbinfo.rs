//! dbinfo - inspect a store file
//!
//! Usage: dbinfo DB [-i | -T | -V | -v ID | -s ID]
//!
//! -i  header summary (default)
//! -T  dump the raw triples table
//! -V  dump the value dictionary
//! -v  print one value
//! -s  print one string

use std::process::exit;

use castor::Store;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} DB [-i | -T | -V | -v ID | -s ID]", program);
    exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("dbinfo");
    if args.len() < 2 {
        usage(program);
    }
    let db_path = &args[1];

    let store = match Store::open(db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    };

    let mode = args.get(2).map(String::as_str).unwrap_or("-i");
    let result = match mode {
        "-i" => info(&store),
        "-T" => dump_triples(&store),
        "-V" => dump_values(&store),
        "-v" | "-s" => {
            let Some(id) = args.get(3).and_then(|a| a.parse::<u32>().ok()) else {
                usage(program);
            };
            if mode == "-v" {
                show_value(&store, id)
            } else {
                show_string(&store, id)
            }
        }
        _ => usage(program),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        exit(2);
    }
}

fn info(store: &Store) -> castor::Result<()> {
    println!("Triples:  {}", store.triples_count());
    println!("Values:   {}", store.value_count());
    println!("Strings:  {}", store.string_count());
    for category in [
        castor::Category::Blank,
        castor::Category::Iri,
        castor::Category::PlainString,
        castor::Category::PlainLanguage,
        castor::Category::TypedString,
        castor::Category::Boolean,
        castor::Category::Numeric,
        castor::Category::DateTime,
        castor::Category::Other,
    ] {
        let range = store.category_values(category);
        let count = if range.is_empty() {
            0
        } else {
            range.to - range.from + 1
        };
        println!("  {:?}: {}", category, count);
    }
    Ok(())
}

fn dump_triples(store: &Store) -> castor::Result<()> {
    for i in 0..store.triples_count() {
        let t = store.raw_triple(i);
        println!("{} {} {}", t.subject(), t.predicate(), t.object());
    }
    Ok(())
}

fn dump_values(store: &Store) -> castor::Result<()> {
    for id in 1..=store.value_count() {
        let value = store.lookup_value(id)?;
        println!("{}: {}", id, value);
    }
    Ok(())
}

fn show_value(store: &Store, id: u32) -> castor::Result<()> {
    let value = store.lookup_value(id)?;
    let class = store.value_eq_class(id);
    println!("{}", value);
    println!("category: {:?}", store.value_category(id));
    println!("equivalence class: [{}, {}]", class.from, class.to);
    Ok(())
}

fn show_string(store: &Store, id: u32) -> castor::Result<()> {
    println!("{}", store.lookup_string(id)?);
    Ok(())
}
