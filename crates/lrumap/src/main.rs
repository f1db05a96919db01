//! lrumap CLI
//!
//! Thin wrapper over lrumap-core: runs YAML scenarios against a bounded LRU
//! map, replays the built-in walkthrough, and prints configuration.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lrumap_core::config::{Config, resolve_config_path};
use lrumap_core::logging::{LogFormat, LogLevel, init_logging};
use lrumap_core::scenario::{Scenario, ScenarioReport};

#[derive(Parser)]
#[command(
    name = "lrumap",
    version,
    about = "Run scenario scripts against a bounded, recency-ordered map",
    long_about = None,
)]
struct Cli {
    /// Config file (defaults to $LRUMAP_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override: trace, debug, info, warn, error
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format override: pretty or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one or more scenario files
    Run(RunArgs),

    /// Replay the built-in walkthrough, printing the map after each step
    Demo(DemoArgs),

    /// Show the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Scenario YAML files
    #[arg(required = true)]
    scenarios: Vec<PathBuf>,

    /// Capacity for scenarios that do not set one (overrides [cache] capacity)
    #[arg(long)]
    capacity: Option<usize>,

    /// Print reports as a JSON array
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DemoArgs {
    /// Map capacity for the walkthrough
    #[arg(long, default_value = "3")]
    capacity: usize,
}

#[derive(Args)]
struct ConfigArgs {
    /// Print the built-in defaults instead of the loaded config
    #[arg(long)]
    print_default: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", error_line(&err));
            if let Some(core) = err.downcast_ref::<lrumap_core::Error>() {
                eprint!("{}", core.remediation().render_plain());
            }
            ExitCode::from(2)
        }
    }
}

/// `err` followed by its causes, skipping a cause whose text already ends
/// the line (core errors embed their source's message).
fn error_line(err: &anyhow::Error) -> String {
    let mut line = err.to_string();
    for cause in err.chain().skip(1) {
        let cause = cause.to_string();
        if !line.ends_with(&cause) {
            line.push_str(": ");
            line.push_str(&cause);
        }
    }
    line
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level.to_string();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate()?;
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Command::Run(args) => run_scenarios(&config, &args),
        Command::Demo(args) => demo(args.capacity),
        Command::Config(args) => show_config(&config, cli.config.as_deref(), args.print_default),
    }
}

fn run_scenarios(config: &Config, args: &RunArgs) -> Result<ExitCode> {
    let default_capacity = args.capacity.unwrap_or(config.cache.capacity);
    let mut reports = Vec::with_capacity(args.scenarios.len());

    for path in &args.scenarios {
        let scenario = Scenario::load(path)
            .with_context(|| format!("loading {}", path.display()))?;
        tracing::debug!(path = %path.display(), scenario = %scenario.name, "loaded scenario");
        reports.push(scenario.run(default_capacity)?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_summary(report);
        }
    }

    if reports.iter().all(ScenarioReport::passed) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn print_summary(report: &ScenarioReport) {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    println!(
        "{verdict} {} ({} steps, capacity {}) {}",
        report.name, report.steps_run, report.capacity, report.rendered
    );
    print_failures(report);
}

fn print_failures(report: &ScenarioReport) {
    for failure in &report.failures {
        println!(
            "  step {} ({}): {}",
            failure.step, failure.op, failure.message
        );
    }
}

fn demo(capacity: usize) -> Result<ExitCode> {
    let walkthrough = Scenario::demo()?;
    // Its expectations only hold at the capacity it was written for.
    let mut scenario = if walkthrough.capacity == Some(capacity) {
        walkthrough
    } else {
        walkthrough.without_expectations()
    };
    scenario.capacity = Some(capacity);

    let report = scenario.run_with(capacity, |number, step, map| {
        println!("{number:>2}. {:<14} {map}", step.op_name());
    })?;

    println!(
        "hits={} misses={} evictions={}",
        report.stats.hits, report.stats.misses, report.stats.evictions
    );
    print_failures(&report);
    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn show_config(config: &Config, explicit: Option<&Path>, print_default: bool) -> Result<ExitCode> {
    if print_default {
        print!("{}", Config::default().to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }
    match resolve_config_path(explicit) {
        Some(path) => println!("# source: {}", path.display()),
        None => println!("# source: defaults"),
    }
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}
