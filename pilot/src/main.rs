//! Game-playing agent decision layer.
//!
//! Reads observations, decides one button press per step and keeps its goal
//! plan and memory in `.pilot/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pilot::core::goals::GoalStatus;
use pilot::core::observation::Observation;
use pilot::io::init::{InitOptions, PilotPaths, init_pilot};
use pilot::io::observations::{JsonlObservations, StdoutSink};
use pilot::io::oracle::{CommandOracle, NoOracle, Oracle};
use pilot::io::prompt::PromptEngine;
use pilot::io::state_store::load_state;
use pilot::looping::run_loop;
use pilot::perception::classify;
use pilot::step::Agent;

#[derive(Parser)]
#[command(
    name = "pilot",
    version,
    about = "Decision layer for a tile-based RPG playing agent"
)]
struct Cli {
    /// Project root containing `.pilot/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.pilot/` with default config and state.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the goal plan with statuses.
    Goals,
    /// Run the agent over a JSONL file of observations, printing one action per line.
    Replay {
        observations: PathBuf,
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Classify a single observation and print the scene as JSON.
    Classify { observation: PathBuf },
}

fn main() {
    pilot::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = PilotPaths::new(&cli.root);
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Goals => cmd_goals(&paths),
        Command::Replay {
            observations,
            max_steps,
        } => cmd_replay(&paths, &observations, max_steps),
        Command::Classify { observation } => cmd_classify(&paths, &observation),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<()> {
    let paths = init_pilot(root, &InitOptions { force })?;
    println!("initialized {}", paths.pilot_dir.display());
    Ok(())
}

fn cmd_goals(paths: &PilotPaths) -> Result<()> {
    let config = paths.load_config()?;
    let (tracker, _) = load_state(&config.state_path).into_parts();
    for goal in tracker.goals() {
        let marker = match goal.status {
            GoalStatus::Completed => "x",
            GoalStatus::Active => ">",
            GoalStatus::Pending => " ",
        };
        println!("[{marker}] {:<24} {}", goal.id, goal.description);
    }
    Ok(())
}

fn cmd_replay(paths: &PilotPaths, observations: &Path, max_steps: Option<u64>) -> Result<()> {
    let config = paths.load_config()?;
    let command = CommandOracle::from_config(&config.oracle, paths.pilot_dir.join("frames"));
    let oracle: &dyn Oracle = match &command {
        Some(command) => command,
        None => &NoOracle,
    };
    let mut agent = Agent::load(config, oracle)?;
    let mut source = JsonlObservations::open(observations)?;
    let mut sink = StdoutSink::stdout();
    let outcome = run_loop(&mut agent, &mut source, &mut sink, max_steps, |_| {})?;
    eprintln!(
        "{} steps ({:?}), active goal: {}",
        outcome.steps_executed,
        outcome.stop,
        agent.state().tracker.current_id().unwrap_or("none")
    );
    Ok(())
}

fn cmd_classify(paths: &PilotPaths, observation: &Path) -> Result<()> {
    let config = paths.load_config()?;
    let raw = fs::read_to_string(observation)
        .with_context(|| format!("read {}", observation.display()))?;
    let obs: Observation = serde_json::from_str(&raw)
        .with_context(|| format!("parse {}", observation.display()))?;
    let command = CommandOracle::from_config(&config.oracle, paths.pilot_dir.join("frames"));
    let oracle: &dyn Oracle = match &command {
        Some(command) => command,
        None => &NoOracle,
    };
    let prompts = PromptEngine::new()?;
    let classification = classify(&obs, oracle, &prompts);
    let mut payload =
        serde_json::to_string_pretty(&classification.result).context("serialize scene")?;
    payload.push('\n');
    print!("{payload}");
    Ok(())
}
