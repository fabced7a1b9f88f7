use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use synapse::agent::{Agent, Coordinator, Resolution};
use synapse::config::{Config, PlannerMode};
use synapse::protocol::ExecutionTrace;
use synapse::tools::{Simulation, display_value, standard_catalogue};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlannerArg {
    Scripted,
    Llm,
}

#[derive(Debug, Parser)]
#[command(name = "synapse", about = "Resolve a last-mile delivery disruption")]
struct Cli {
    /// Free-text description of the disruption
    #[arg(value_name = "SCENARIO", required_unless_present = "catalogue")]
    scenario: Option<String>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    planner: Option<PlannerArg>,
    /// Seed for the simulated backends
    #[arg(long)]
    seed: Option<u64>,
    /// Skip simulated network latency
    #[arg(long)]
    no_latency: bool,
    /// Print the resolution as JSON
    #[arg(long)]
    json: bool,
    /// List the available actions and exit
    #[arg(long)]
    catalogue: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("synapse=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(planner) = cli.planner {
        config.planner = match planner {
            PlannerArg::Scripted => PlannerMode::Scripted,
            PlannerArg::Llm => PlannerMode::Llm,
        };
    }
    if cli.seed.is_some() {
        config.simulation.seed = cli.seed;
    }
    if cli.no_latency {
        config.simulation.latency_scale = 0.0;
    }

    if cli.catalogue {
        return print_catalogue(&config);
    }

    let scenario = cli.scenario.unwrap_or_default();
    let coordinator = Coordinator::from_config(&config).context("building resolver")?;
    match coordinator.resolve(&scenario) {
        Ok(resolution) if cli.json => {
            println!("{}", serde_json::to_string_pretty(&resolution)?);
            Ok(())
        }
        Ok(resolution) => {
            print_resolution(&resolution);
            Ok(())
        }
        Err(err) => {
            if let Some(trace) = err.partial_trace() {
                eprintln!("{}", "--- COMPLETED BEFORE FAILURE ---".yellow());
                print_trace(trace);
            }
            Err(err).context("resolution failed")
        }
    }
}

fn print_catalogue(config: &Config) -> anyhow::Result<()> {
    let registry = standard_catalogue(&Simulation::from_config(&config.simulation))?;
    for spec in registry.catalogue() {
        let inputs = spec.required_inputs().join(", ");
        println!("{} ({inputs})", spec.name.bold());
        println!("    {}", spec.description);
        println!("    -> {}", spec.output_fields.join(", ").dimmed());
    }
    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    println!("{} {}", "case:".dimmed(), resolution.case_id);
    println!(
        "{} {} ({} planner)",
        "category:".dimmed(),
        resolution.category.to_string().cyan(),
        resolution.planner
    );
    println!("{}", "--- TRACE ---".bold());
    print_trace(&resolution.trace);
    println!("{}", "--- RESOLUTION ---".bold());
    println!("{}", resolution.output.green());
}

fn print_trace(trace: &ExecutionTrace) {
    for entry in trace.entries() {
        let fields = entry
            .result
            .fields()
            .iter()
            .filter(|(name, _)| name.as_str() != "status")
            .map(|(name, value)| format!("{name}={}", display_value(value)))
            .collect::<Vec<_>>()
            .join(" ");
        let retries = if entry.attempts > 1 {
            format!(" after {} attempts", entry.attempts)
        } else {
            String::new()
        };
        println!(
            "  {} {} [{}]{} {}",
            entry.step.dimmed(),
            entry.action.bold(),
            entry.result.status().green(),
            retries.yellow(),
            fields
        );
    }
}
