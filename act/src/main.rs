//! Act phase of a plan-and-act control loop.
//!
//! Runs one act-phase variant over a JSON scenario for a bounded number of
//! cycles, printing one line per cycle. Instructions published by the
//! dispatch variants are written to stdout as `<destination> <json>` lines.

use std::io;
use std::path::{Path, PathBuf};

use act::asynch::AsyncAct;
use act::core::goal_graph::{DeclaredGoalsWorld, MemoryGoalGraph};
use act::cycle::run_cycles;
use act::dispatch::{DispatchAct, PublishingAct};
use act::exit_codes;
use act::io::config::{ActConfig, DEFAULT_CONFIG_FILE, load_config, write_config};
use act::io::publish::LinePublisher;
use act::io::scenario::{LoadedScenario, load_scenario};
use act::io::slot::InstructionSlot;
use act::io::trace::JsonlTrace;
use act::logging;
use act::phase::{ActPhase, Memory};
use act::simple::{FirstPlanAct, SimpleAct};
use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

#[derive(Parser)]
#[command(name = "act", version, about = "Act phase of a plan-and-act control loop")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an act-phase variant over a scenario file.
    Run {
        /// JSON scenario with goals, plans and an optional instruction queue.
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, value_enum, default_value_t = Variant::Simple)]
        variant: Variant,
        /// Maximum number of cycles to run.
        #[arg(long, default_value_t = 10)]
        cycles: u64,
        /// Config file (defaults to `act.toml`; missing means defaults).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write per-cycle trace records to this JSON-lines file.
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Write the default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Plan achieving the most goals, one step per cycle.
    Simple,
    /// First unfinished matching plan, one step per cycle.
    First,
    /// Asynchronous actions polled for completion.
    Async,
    /// Forward the scenario's instruction queue.
    Dispatch,
    /// Publish plan steps as instructions.
    Publish,
}

struct RunArgs {
    scenario: PathBuf,
    variant: Variant,
    cycles: u64,
    config: Option<PathBuf>,
    trace: Option<PathBuf>,
}

type ScenarioPhase = Box<dyn ActPhase<MemoryGoalGraph, DeclaredGoalsWorld>>;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run {
            scenario,
            variant,
            cycles,
            config,
            trace,
        } => cmd_run(RunArgs {
            scenario,
            variant,
            cycles,
            config,
            trace,
        }),
        Command::InitConfig { force, path } => cmd_init_config(&path, force),
    }
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ActConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;
    let LoadedScenario {
        goals,
        graph,
        world,
        queue,
    } = load_scenario(&args.scenario)?
        .build()
        .with_context(|| format!("build scenario {}", args.scenario.display()))?;

    let mut memory = Memory::new(graph, config.action_log());
    if let Some(path) = args.trace.as_ref().or(config.trace_path.as_ref()) {
        memory = memory.with_trace(Box::new(JsonlTrace::create(path)?));
    }

    let mut phase: ScenarioPhase = match args.variant {
        Variant::Simple => Box::new(SimpleAct::new(config.max_plan_print_size)),
        Variant::First => Box::new(FirstPlanAct::new(config.max_plan_print_size)),
        Variant::Async => Box::new(AsyncAct::new()),
        Variant::Dispatch => {
            let Some(queue) = queue else {
                bail!("scenario has no instructions for the dispatch variant");
            };
            let slot = InstructionSlot::new();
            slot.store(&queue)?;
            Box::new(DispatchAct::new(
                slot,
                LinePublisher::new(io::stdout()),
                config.dispatch.clone(),
            ))
        }
        Variant::Publish => Box::new(PublishingAct::new(
            LinePublisher::new(io::stdout()),
            config.dispatch.clone(),
            config.max_plan_print_size,
        )),
    };
    info!(variant = ?args.variant, cycles = args.cycles, "starting act phase");

    let summary = run_cycles(
        phase.as_mut(),
        &mut memory,
        args.cycles,
        |memory| {
            goals
                .iter()
                .filter(|goal| memory.goal_graph.goals().contains(goal))
                .cloned()
                .collect()
        },
        |_| Some(world.clone()),
        |cycle, outcome| println!("cycle {cycle}: {outcome}"),
    )?;

    println!(
        "{} cycles, {} actions",
        summary.cycles_run, summary.actions_taken
    );
    if summary.terminated() {
        return Ok(exit_codes::TERMINATED);
    }
    Ok(exit_codes::OK)
}
