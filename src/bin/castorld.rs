//! castorld - build a store from an RDF document
//!
//! Usage: castorld [-s SYNTAX] [-f] DB RDF
//!
//! Reads RDF (N-Triples) and writes the read-only store image at DB.
//! Refuses to overwrite an existing DB unless -f is given.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::exit;

use castor::builder::{ntriples, StoreBuilder};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} [-s SYNTAX] [-f] DB RDF", program);
    exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("castorld");

    let mut syntax = "ntriples".to_string();
    let mut force = false;
    let mut positional: Vec<&str> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-s" => {
                i += 1;
                if i >= args.len() {
                    usage(program);
                }
                syntax = args[i].clone();
            }
            "-f" => force = true,
            arg if arg.starts_with('-') => usage(program),
            arg => positional.push(arg),
        }
        i += 1;
    }

    if positional.len() != 2 {
        usage(program);
    }
    let db_path = positional[0];
    let rdf_path = positional[1];

    if syntax != "ntriples" {
        eprintln!("Unsupported syntax '{}'; only 'ntriples' is built in.", syntax);
        exit(1);
    }
    if !Path::new(rdf_path).exists() {
        eprintln!("Cannot find RDF input '{}'.", rdf_path);
        exit(2);
    }
    if !force && Path::new(db_path).exists() {
        eprintln!("Output file '{}' already exists. Exiting.", db_path);
        exit(2);
    }

    if let Err(e) = build(db_path, rdf_path) {
        eprintln!("{}", e);
        exit(2);
    }
    println!("Done.");
}

fn build(db_path: &str, rdf_path: &str) -> castor::Result<()> {
    println!("Parsing RDF...");
    let mut builder = StoreBuilder::create(db_path)?;
    let reader = BufReader::new(File::open(rdf_path)?);
    ntriples::parse(reader, |s, p, o| builder.add_triple(&s, &p, &o))?;

    println!("Building store...");
    builder.finish()
}
