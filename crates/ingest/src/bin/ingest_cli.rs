use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use ingest::{aggregate_usage, apply_cumulative_adjustments, usage_records_from_reader};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: ingest_cli <path|->");
        std::process::exit(2);
    }

    let path = &args[1];
    let reader: Box<dyn BufRead> = if path == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(path).unwrap_or_else(|err| {
            eprintln!("failed to open {}: {}", path, err);
            std::process::exit(1);
        });
        Box::new(BufReader::new(file))
    };

    let parsed = usage_records_from_reader(reader, path).unwrap_or_else(|err| {
        eprintln!("failed to read {}: {}", path, err);
        std::process::exit(1);
    });
    let reconciled = apply_cumulative_adjustments(parsed.records, BTreeMap::new());
    for issue in parsed.issues.iter().chain(reconciled.issues.iter()) {
        eprintln!("warning: {}", issue);
    }

    let totals = aggregate_usage(&reconciled.records);
    if totals.is_empty() {
        eprintln!("no usage records found");
        std::process::exit(3);
    }
    for entry in totals {
        println!(
            "{} {} input={} output={} cache={} thinking={} total={}",
            entry.day,
            entry.model,
            entry.tokens.input,
            entry.tokens.output,
            entry.tokens.cache,
            entry.tokens.thinking,
            entry.tokens.total
        );
    }
}
