// Skill Tree Optimizer v0.1.0 — layout search and upgrade allocation
// Seedable ChaCha8 streams, rayon batch evaluation, optional JSON report
//
// Usage:
//   cargo run --release --bin optimize                         # Layout search, default params
//   cargo run --release --bin optimize -- upgrades --budget 12 # Rank upgrade allocations
//   cargo run --release --bin optimize -- outcomes             # List match outcome sequences
//   cargo run --release --bin optimize -- --config params.json --rank 20
//   cargo run --release --bin optimize -- --json out/run.json  # Write a JSON report
//
// RUST_LOG=skilltree=debug raises log detail (default: info).

mod pipeline;
mod report;

use pipeline::Context;
use report::*;
use skilltree_engine::generator::{GeneratorKind, NodeRoles};
use skilltree_engine::ranks::rank_name;
use skilltree_engine::upgrades::UpgradeStrategy;
use skilltree_engine::{Catalogue, EvaluationResult, OptimizerParams, RankTable};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Layouts,
    Upgrades,
    Outcomes,
}

struct CliArgs {
    mode: Mode,
    config: Option<PathBuf>,
    catalogue: Option<PathBuf>,
    json: Option<PathBuf>,
    top: usize,
    overrides: Vec<(String, String)>,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs { mode: Mode::Layouts, config: None, catalogue: None, json: None, top: 5, overrides: Vec::new() };

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String, String> {
            i += 1;
            args.get(i).cloned().ok_or_else(|| format!("{} expects a value", flag))
        };
        match flag {
            "--config" => cli.config = Some(PathBuf::from(value()?)),
            "--catalogue" => cli.catalogue = Some(PathBuf::from(value()?)),
            "--json" => cli.json = Some(PathBuf::from(value()?)),
            "--top" => cli.top = value()?.parse().map_err(|_| "--top expects a count".to_string())?,
            "--sequential" => cli.overrides.push(("parallel".to_string(), "false".to_string())),
            "--rank" | "--candidates" | "--seed" | "--iterations" | "--patience" | "--budget" | "--refine-top"
            | "--layouts-per-config" | "--strategy" | "--samples" | "--generator" | "--radius" | "--rounds"
            | "--max-flips" | "--teammates" => {
                let v = value()?;
                cli.overrides.push((flag.trim_start_matches("--").to_string(), v));
            }
            "layouts" => cli.mode = Mode::Layouts,
            "upgrades" => cli.mode = Mode::Upgrades,
            "outcomes" => cli.mode = Mode::Outcomes,
            _ => return Err(format!("Unknown argument: {}", flag)),
        }
        i += 1;
    }

    Ok(cli)
}

fn parse_num<T: std::str::FromStr>(flag: &str, v: &str) -> Result<T, String> {
    v.parse().map_err(|_| format!("--{} expects a number, got '{}'", flag, v))
}

/// Apply CLI overrides on top of defaults or a loaded config file.
fn apply_overrides(params: &mut OptimizerParams, overrides: &[(String, String)]) -> Result<(), String> {
    for (flag, v) in overrides {
        match flag.as_str() {
            "rank" => params.rank = parse_num(flag, v)?,
            "candidates" => params.candidates = parse_num(flag, v)?,
            "seed" => params.seed = parse_num(flag, v)?,
            "iterations" => params.max_iterations = parse_num(flag, v)?,
            "patience" => params.patience = parse_num(flag, v)?,
            "budget" => params.budget = parse_num(flag, v)?,
            "refine-top" => params.refine_top = parse_num(flag, v)?,
            "layouts-per-config" => params.layouts_per_config = parse_num(flag, v)?,
            "samples" => params.upgrade_samples = parse_num(flag, v)?,
            "radius" => params.grid_radius = parse_num(flag, v)?,
            "rounds" => params.rounds_to_win = parse_num(flag, v)?,
            "max-flips" => params.max_flips = parse_num(flag, v)?,
            "teammates" => params.teammate_count = parse_num(flag, v)?,
            "parallel" => params.parallel = v == "true",
            "strategy" => {
                params.upgrade_strategy = match v.as_str() {
                    "tiered" => UpgradeStrategy::Tiered,
                    "exhaustive" => UpgradeStrategy::Exhaustive,
                    _ => return Err(format!("--strategy expects tiered|exhaustive, got '{}'", v)),
                }
            }
            "generator" => {
                params.generator = match v.as_str() {
                    "ring_priority" | "rings" => GeneratorKind::RingPriority,
                    "hub_cluster" | "cluster" => GeneratorKind::HubCluster,
                    _ => return Err(format!("--generator expects ring_priority|hub_cluster, got '{}'", v)),
                }
            }
            _ => return Err(format!("Unknown override: --{}", flag)),
        }
    }
    Ok(())
}

fn load_context(cli: &CliArgs) -> Result<Context, String> {
    let mut params = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            OptimizerParams::from_json(&json).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => OptimizerParams::default(),
    };
    apply_overrides(&mut params, &cli.overrides)?;
    params.validate().map_err(|e| e.to_string())?;

    let catalogue = match &cli.catalogue {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            Catalogue::from_json(&json).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => Catalogue::standard(),
    };

    Ok(Context { catalogue, ranks: RankTable::standard(), roles: NodeRoles::standard(), params })
}

// ─── Printing ───────────────────────────────────────────────────────────────

fn print_header() {
    println!("  {:<4} {:>10} {:>10} {:>10} {:>7} {:>6} {:>6} {:>7}",
        "#", "Worst", "Mean", "Best", "Pos", "Eff", "Adj", "Trig/F");
    println!("  {}", "-".repeat(68));
}

fn print_result(idx: usize, r: &EvaluationResult) {
    println!("  {:<4} {:>10} {:>10.0} {:>10} {:>3}/{:<3} {:>6.3} {:>6.0} {:>7}",
        idx + 1,
        r.min,
        r.mean,
        r.max,
        r.positive,
        r.total_outcomes,
        r.efficiency,
        r.adjacency_score,
        r.max_triggers_per_flip,
    );
}

fn print_placement(r: &EvaluationResult) {
    for (name, cell) in &r.layout.placement {
        println!("      {:<18} {}", name, cell);
    }
}

fn print_layouts(run: &LayoutRun, top: usize) {
    println!("  Generated: {}  Evaluated: {}  Rejected: {}", run.generated, run.evaluated, run.rejected);
    println!("  Batch worst-case: mean {:.0} ± {:.0}  range [{:.0}, {:.0}]\n",
        run.batch_min.mean,
        (run.batch_min.ci_upper - run.batch_min.ci_lower) / 2.0,
        run.batch_min.min,
        run.batch_min.max,
    );
    print_header();
    for (i, r) in run.refined.iter().take(top).enumerate() {
        print_result(i, &r.result);
    }
    if let Some(best) = run.refined.first() {
        println!("\n  Best layout (from worst-case {} in {} iterations, {} improvements):",
            best.initial_min, best.iterations, best.improvements);
        print_placement(&best.result);
    }
    println!("\n  Cache: {} lookups, {:.1}% hits, {} entries",
        run.cache.lookups, run.cache.hit_rate() * 100.0, run.cache.entries);
}

fn print_upgrades(run: &UpgradeRun, top: usize) {
    println!("  Configs: {}  Scored: {}\n", run.configs, run.ranked.len());
    print_header();
    for (i, c) in run.ranked.iter().take(top).enumerate() {
        print_result(i, &c.best);
        let spend: Vec<String> = c.upgrades.iter()
            .filter(|(_, levels)| levels.iter().any(|&l| l > 0))
            .map(|(name, levels)| format!("{} {:?}", name, levels))
            .collect();
        println!("       {} pts: {}", c.points, spend.join(", "));
    }
}

fn print_outcomes(lines: &[OutcomeLine]) {
    println!("  {:<8} {:>4} {:>6}  {}", "Label", "Wins", "Losses", "Round");
    println!("  {}", "-".repeat(30));
    for l in lines {
        println!("  {:<8} {:>4} {:>6}  {}", l.label, l.wins, l.losses, if l.round_won { "WIN" } else { "LOSS" });
    }
    println!("\n  Total: {}", lines.len());
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    let ctx = match load_context(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    let params = &ctx.params;

    println!("\n  Skill Tree Optimizer v0.1.0");
    println!("  PRNG: ChaCha8Rng | Seed: {} | Rank: {} ({}) | Budget: {}",
        params.seed, params.rank, rank_name(params.rank), params.budget);
    println!("  Mode: {:?} | Nodes: {} | Grid radius: {}\n", cli.mode, ctx.catalogue.len(), params.grid_radius);

    let start = Instant::now();
    let run = match cli.mode {
        Mode::Layouts => pipeline::run_layouts(&ctx).map(|run| {
            print_layouts(&run, cli.top);
            ModeReport::Layouts(run)
        }),
        Mode::Upgrades => pipeline::run_upgrades(&ctx).map(|run| {
            print_upgrades(&run, cli.top);
            ModeReport::Upgrades(run)
        }),
        Mode::Outcomes => {
            let sequences = pipeline::list_outcomes(params);
            print_outcomes(&sequences);
            Ok(ModeReport::Outcomes { sequences })
        }
    };
    let run = match run {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Optimization failed: {}", e);
            std::process::exit(1);
        }
    };
    let elapsed = start.elapsed();
    println!("  Time: {:.2}s\n", elapsed.as_secs_f64());

    // ─── Write JSON Report ──────────────────────────────────────────────

    let Some(path) = cli.json else { return };
    let ts = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    let report = RunReport {
        timestamp: ts.to_string(),
        version: "0.1.0",
        prng: "ChaCha8Rng",
        rank_name: rank_name(params.rank),
        params: params.clone(),
        elapsed_ms: elapsed.as_millis(),
        run,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }
    let written = serde_json::to_string_pretty(&report)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => println!("  Results saved to: {}\n", path.display()),
        Err(e) => {
            eprintln!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mode_and_overrides_parse() {
        let cli = parse_args(&args(&["upgrades", "--budget", "12", "--strategy", "exhaustive", "--sequential"]))
            .expect("test: parse");
        assert_eq!(cli.mode, Mode::Upgrades);
        let mut params = OptimizerParams::default();
        apply_overrides(&mut params, &cli.overrides).expect("test: overrides");
        assert_eq!(params.budget, 12);
        assert_eq!(params.upgrade_strategy, UpgradeStrategy::Exhaustive);
        assert!(!params.parallel);
    }

    #[test]
    fn bad_arguments_are_reported() {
        assert!(parse_args(&args(&["--rank"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
        let cli = parse_args(&args(&["--rank", "high"])).expect("test: parse");
        assert!(apply_overrides(&mut OptimizerParams::default(), &cli.overrides).is_err());
    }

    #[test]
    fn out_of_range_override_fails_validation() {
        let cli = CliArgs {
            mode: Mode::Layouts,
            config: None,
            catalogue: None,
            json: None,
            top: 5,
            overrides: vec![("rank".to_string(), "0".to_string())],
        };
        assert!(load_context(&cli).is_err());
    }
}
