//! # Mixpath
//!
//! Command line front end for the set planner.
//!
//! Logging is controlled via `RUST_LOG`:
//! - `RUST_LOG=debug mixpath plan ...` - leg decisions and waypoint ordering
//! - `RUST_LOG=mixpath::search=trace mixpath plan ...` - frontier expansion

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use mixpath::cli::{self, Command, PlanArgs};
use mixpath::config::{get_config_path, RuntimeConfig};
use mixpath::graph::TrackGraph;
use mixpath::harmonic::{compatibility, compatibility_str};
use mixpath::model::{PathConstraints, PathRequest, PathfinderResult, SearchOptions, Waypoint};
use mixpath::{completion, compute_path, compute_paths_parallel, snapshot};
use std::path::Path;

fn load_config(explicit: Option<&Path>) -> Result<RuntimeConfig> {
    match explicit {
        Some(path) => RuntimeConfig::load(path),
        None => RuntimeConfig::load_or_default(&get_config_path()?),
    }
}

/// Merge flags over the config file.
fn plan_inputs(args: &PlanArgs, config: &RuntimeConfig) -> (PathRequest, PathConstraints, SearchOptions) {
    let mut request = PathRequest::new(args.start.clone());
    request.end_id.clone_from(&args.end);
    for id in &args.waypoints {
        request.waypoints.insert(Waypoint::unlocked(id.clone()));
    }
    for id in &args.locked {
        request.waypoints.insert(Waypoint::locked(id.clone()));
    }

    let mut constraints = PathConstraints::new(args.duration, args.tolerance.unwrap_or(config.tolerance_minutes));
    constraints.prefer_key_matching = args.prefer_key_matching.unwrap_or(config.prefer_key_matching);
    constraints.min_bpm = args.min_bpm;
    constraints.max_bpm = args.max_bpm;
    constraints.allowed_keys = (!args.allowed_keys.is_empty()).then(|| args.allowed_keys.clone());
    constraints.max_energy_change = args.max_energy_change;
    constraints.energy_flow = args.energy_flow;
    constraints.waypoint_slack = args.waypoint_slack.unwrap_or(config.waypoint_slack_minutes);

    let mut options = config.search_options();
    if let Some(variant) = args.variant {
        options.algorithm_variant = variant;
    }
    if let Some(budget) = args.step_budget {
        options.step_budget = budget;
    }
    if let Some(hops) = args.max_detour_hops {
        options.max_detour_hops = hops;
    }

    (request, constraints, options)
}

fn format_minutes(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn print_result(result: &PathfinderResult) {
    println!("{:>3}  {:<32} {:<24} {:>6} {:>4} {:>8} {:>9} {:>8}", "#", "Title", "Artist", "BPM", "Key", "Strength", "Mix", "At");
    for (position, segment) in result.path.iter().enumerate() {
        let track = &segment.track;
        let bpm = track.bpm.map_or_else(|| "-".to_string(), |bpm| format!("{bpm:.1}"));
        let key = track.camelot_key.as_deref().unwrap_or("-");
        let strength = if segment.is_synthetic_edge {
            "synthetic".to_string()
        } else {
            segment.connection_strength.map_or_else(|| "-".to_string(), |s| format!("{s:.2}"))
        };
        let mix = segment.key_class.map_or_else(|| "-".to_string(), |class| class.to_string());
        println!(
            "{:>3}  {:<32} {:<24} {:>6} {:>4} {:>8} {:>9} {:>8}",
            position + 1,
            truncate(&track.name, 32),
            truncate(&track.artist, 24),
            bpm,
            key,
            strength,
            mix,
            format_minutes(segment.cumulative_duration_ms)
        );
    }
    println!();
    println!(
        "Total {} (target {}), average strength {:.2}, key score {:.2}",
        format_minutes(result.total_duration_ms),
        format_minutes(result.target_duration_ms),
        result.average_connection_strength,
        result.key_compatibility_score
    );
    if !result.waypoints_missed.is_empty() {
        println!("Missed waypoints: {}", result.waypoints_missed.join(", "));
    }
    let status = if result.success { "OK" } else { "FAILED" };
    println!("{status}: {}", result.message);
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}

fn run_plan(args: &PlanArgs, config: &RuntimeConfig) -> Result<()> {
    let snapshot = snapshot::load_snapshot(&args.graph)?;
    let (request, constraints, options) = plan_inputs(args, config);
    debug!("Plan options: {options:?}");

    let result = compute_path(&snapshot, &request, &constraints, &options)
        .with_context(|| format!("Cannot plan with graph {}", args.graph.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn run_neighbors(graph_path: &Path, id: &str) -> Result<()> {
    let snapshot = snapshot::load_snapshot(graph_path)?;
    let graph = TrackGraph::build(&snapshot)?;
    let index = graph.index_of(id).with_context(|| format!("Track '{id}' is not in {}", graph_path.display()))?;
    let from = graph.track(index);

    let mut rows: Vec<_> = graph
        .neighbours(index)
        .iter()
        .filter_map(|&n| graph.edge_between(index, n).map(|edge| (n, edge)))
        .collect();
    rows.sort_by(|a, b| b.1.strength.total_cmp(&a.1.strength));

    for (n, edge) in rows {
        let to = graph.track(n);
        println!(
            "{:<16} {:<32} strength {:.2}  weight {:>6.1}  {}",
            to.id(),
            truncate(&to.track.name, 32),
            edge.strength,
            edge.weight,
            compatibility(from.key, to.key).class
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        Command::Plan(plan) => {
            let config = load_config(args.config.as_deref())?;
            info!("Planning {} min from '{}'", plan.duration, plan.start);
            run_plan(&plan, &config)?;
        }
        Command::Batch { graph, plans } => {
            let snapshot = snapshot::load_snapshot(&graph)?;
            let plans = snapshot::load_plans(&plans)?;
            info!("Planning {} requests in parallel", plans.len());
            let results = compute_paths_parallel(&snapshot, &plans)?;
            let json: Vec<serde_json::Value> = results
                .into_iter()
                .map(|result| match result {
                    Ok(result) => serde_json::to_value(result),
                    Err(error) => Ok(serde_json::json!({ "error": error.to_string() })),
                })
                .collect::<Result<_, _>>()?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Compat { a, b } => {
            let result = compatibility_str(&a, &b)?;
            println!("{a} -> {b}: {} ({:.2})", result.class, result.score);
        }
        Command::Neighbors { graph, id } => {
            run_neighbors(&graph, &id)?;
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}
