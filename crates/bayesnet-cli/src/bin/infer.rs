//! infer - exact posterior queries against a Bayesian network model file
//!
//! Usage:
//!   infer --model chain.json --query C                       # P(C)
//!   infer --model chain.json --query C --evidence A=yes      # P(C | A=yes)
//!   infer --model chain.json --query A,B --map -o json       # joint + MAP as JSON
//!   infer --model chain.json --batch requests.json           # many queries at once

use std::process;

use bayesnet_core::{
    EliminationHeuristic, Evidence, InferenceConfig, ModelDefinition, Posterior,
    QueryRequest, QueryRequestDef, StateRef, VariableElimination,
};
use clap::{ArgAction, Parser};
use serde_json::json;

#[derive(Parser)]
#[command(name = "infer")]
#[command(version)]
#[command(about = "Exact inference on discrete Bayesian networks")]
#[command(long_about = "Compute posterior distributions by variable elimination over a JSON model definition")]
struct Cli {
    /// Model definition (JSON)
    #[arg(short, long, value_name = "FILE")]
    model: String,

    /// Query variables, comma separated
    #[arg(short, long, value_name = "VAR", value_delimiter = ',', required_unless_present = "batch")]
    query: Vec<String>,

    /// Observation VAR=STATE, where STATE is a label or an index (repeatable)
    #[arg(short, long, value_name = "VAR=STATE", value_parser = parse_observation)]
    evidence: Vec<(String, StateRef)>,

    /// Elimination heuristic: min-weight, min-neighbors, min-fill, or topological
    #[arg(long, default_value = "min-weight", value_name = "NAME")]
    heuristic: EliminationHeuristic,

    /// Explicit elimination order, comma separated (overrides --heuristic)
    #[arg(long, value_name = "VAR", value_delimiter = ',')]
    order: Vec<String>,

    /// Skip variables that cannot influence the query
    #[arg(long)]
    prune: bool,

    /// Also report the most probable joint assignment of the query variables
    #[arg(long)]
    map: bool,

    /// Report elimination statistics
    #[arg(long)]
    diagnostics: bool,

    /// Run the JSON array of {"variables": [...], "evidence": {...}} requests in FILE
    #[arg(long, value_name = "FILE", conflicts_with_all = ["query", "evidence", "order", "map", "diagnostics"])]
    batch: Option<String>,

    /// Output format: summary or json
    #[arg(short, long, default_value = "summary", value_name = "FORMAT")]
    output: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_observation(pair: &str) -> Result<(String, StateRef), String> {
    Evidence::parse_pair(pair).ok_or_else(|| format!("expected VAR=STATE, got '{}'", pair))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        tracing_subscriber::EnvFilter::new(default)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let definition = match ModelDefinition::from_path(&cli.model) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error loading model '{}': {}", cli.model, e);
            process::exit(1);
        }
    };
    let network = match definition.build() {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Model validation error: {}", e);
            process::exit(1);
        }
    };
    tracing::debug!(
        model = %cli.model,
        variables = network.len(),
        "loaded network"
    );

    let config = InferenceConfig::default()
        .with_heuristic(cli.heuristic)
        .with_pruning(cli.prune);
    let engine = match VariableElimination::with_config(&network, config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = &cli.batch {
        run_batch(&engine, path, &cli.output);
        return;
    }

    let evidence: Evidence = cli.evidence.iter().cloned().collect();
    let result = if cli.order.is_empty() {
        engine
            .query_with_diagnostics(&cli.query, &evidence)
            .map(|(p, d)| (p, Some(d)))
    } else {
        engine
            .query_with_order(&cli.query, &evidence, &cli.order)
            .map(|p| (p, None))
    };
    let (posterior, diagnostics) = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Query error: {}", e);
            process::exit(1);
        }
    };
    let map = if cli.map { posterior.mode() } else { None };

    match cli.output.as_str() {
        "json" => {
            let mut out = json!({
                "query": cli.query,
                "evidence": evidence
                    .iter()
                    .map(|(var, state)| (var.to_string(), state.to_string()))
                    .collect::<std::collections::BTreeMap<_, _>>(),
                "posterior": posterior,
            });
            if let Some(map) = &map {
                out["map"] = json!(map);
            }
            if cli.diagnostics {
                out["diagnostics"] = json!(diagnostics);
            }
            match serde_json::to_string_pretty(&out) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing to JSON: {}", e);
                    process::exit(1);
                }
            }
        }
        "summary" => {
            print_posterior(&posterior);
            if let Some(map) = &map {
                let labels: Vec<String> = map
                    .assignment
                    .iter()
                    .map(|(var, state)| format!("{}={}", var, state))
                    .collect();
                println!("MAP: {} ({:.6})", labels.join(", "), map.probability);
            }
            if cli.diagnostics {
                if let Some(d) = &diagnostics {
                    println!("order: [{}]", d.order.join(", "));
                    println!("eliminated: {}, skipped: {}", d.eliminated.len(), d.skipped.len());
                    println!("largest factor: {} entries", d.max_intermediate_size);
                    println!("P(evidence) = {:.6e}", d.evidence_probability);
                }
            }
        }
        other => {
            eprintln!("Unknown output format '{}' (expected summary or json)", other);
            process::exit(1);
        }
    }
}

fn print_posterior(posterior: &Posterior) {
    for (label, p) in posterior.entries() {
        println!("{}: {:.6}", label, p);
    }
}

fn run_batch(engine: &VariableElimination<'_>, path: &str, output: &str) {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading batch file '{}': {}", path, e);
            process::exit(1);
        }
    };
    let requests: Vec<QueryRequest> = match serde_json::from_str::<Vec<QueryRequestDef>>(&source) {
        Ok(defs) => defs.into_iter().map(QueryRequest::from).collect(),
        Err(e) => {
            eprintln!("Error parsing batch file '{}': {}", path, e);
            process::exit(1);
        }
    };

    let batch = engine.query_batch(&requests);
    match output {
        "json" => {
            let results: Vec<serde_json::Value> = requests
                .iter()
                .zip(&batch.results)
                .map(|(req, res)| match res {
                    Ok(p) => json!({"query": req.variables, "posterior": p}),
                    Err(e) => json!({"query": req.variables, "error": e.to_string()}),
                })
                .collect();
            match serde_json::to_string_pretty(&results) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing to JSON: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => {
            for (req, res) in requests.iter().zip(&batch.results) {
                println!("[{}]", req.variables.join(", "));
                match res {
                    Ok(p) => print_posterior(p),
                    Err(e) => println!("error: {}", e),
                }
            }
        }
    }
    if batch.stats.failures > 0 {
        eprintln!(
            "{} of {} queries failed",
            batch.stats.failures, batch.stats.requests
        );
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("infer").chain(args.iter().copied()))
    }

    #[test]
    fn batch_runs_alone() {
        let cli = parse(&["--model", "m.json", "--batch", "r.json", "-o", "json"]).unwrap();
        assert_eq!(cli.batch.as_deref(), Some("r.json"));
        assert!(cli.query.is_empty());
    }

    #[test]
    fn batch_rejects_single_query_flags() {
        for extra in [
            &["--query", "C"][..],
            &["--evidence", "A=yes"][..],
            &["--order", "B"][..],
            &["--map"][..],
            &["--diagnostics"][..],
        ] {
            let mut args = vec!["--model", "m.json", "--batch", "r.json"];
            args.extend_from_slice(extra);
            assert!(parse(&args).is_err(), "accepted {:?}", extra);
        }
    }

    #[test]
    fn single_query_accepts_evidence() {
        let cli = parse(&["--model", "m.json", "-q", "A,B", "-e", "C=1", "--diagnostics"]).unwrap();
        assert_eq!(cli.query, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(cli.evidence, vec![("C".to_string(), StateRef::Label("1".into()))]);
        assert!(cli.diagnostics);
    }
}
