//! Minimal CLI validator.
//!
//! Reads a wire-encoded `Message` from a file (or stdin with `-`), decodes
//! it, and runs the advertisement validator over its `Advertisement` body,
//! printing a JSON validation report.
//!
//! Usage: `advfunc-validate [--packed] [--traversal-bytes N] <path|->`

#![forbid(unsafe_code)]

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use commelec_advfunc::validate;
use commelec_advfunc::wire::{Message, TraversalLimit, WireFormat};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

/// The first argument (after argv[0]) that is neither a known flag nor a
/// known flag's value, e.g. the `file.bin` in
/// `advfunc-validate --traversal-bytes 1000 file.bin`.
fn find_positional(args: &[String]) -> Option<String> {
    let mut it = args.iter().skip(1);
    while let Some(a) = it.next() {
        if a == "--traversal-bytes" {
            it.next();
            continue;
        }
        if a.starts_with("--") {
            continue;
        }
        return Some(a.clone());
    }
    None
}

fn read_input(path: &str) -> io::Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(path)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let packed = args.iter().any(|a| a == "--packed");
    let traversal_bytes = parse_flag(&args, "--traversal-bytes")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or_else(|| TraversalLimit::default().0);
    let path = match find_positional(&args) {
        Some(p) => p,
        None => {
            eprintln!("usage: advfunc-validate [--packed] [--traversal-bytes N] <path|->");
            return ExitCode::FAILURE;
        }
    };

    let bytes = match read_input(&path) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to read input");
            return ExitCode::FAILURE;
        }
    };

    let message = match Message::from_bytes(&bytes, packed, TraversalLimit(traversal_bytes)) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "failed to decode message");
            return ExitCode::FAILURE;
        }
    };

    match validate::validate(&message) {
        Ok(report) => {
            let json = serde_json::json!({
                "pq_hull": {"min": report.pq_hull.min, "max": report.pq_hull.max},
                "belief_hull": {"min": report.belief_hull.min, "max": report.belief_hull.max},
                "samples_checked": report.samples_checked,
            });
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "advertisement failed validation");
            ExitCode::FAILURE
        }
    }
}
