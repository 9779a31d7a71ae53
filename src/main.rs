use goalsim::{BackgroundExecution, GoalOutput, Scenario, ScenarioConfig, Triple};
use goalsim::{bench_iterate, bench_svd};

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Run a goal-based constraint solver scenario")]
struct Args {
    /// Scenario file; looked up in `scenarios/` when not found as given
    #[arg(short, default_value = "hanging_chain.yaml")]
    file_name: String,

    /// Run on the background loop for this many milliseconds instead of `execute`
    #[arg(long)]
    background_ms: Option<u64>,

    /// Run the built-in benchmarks and exit
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let given = PathBuf::from(file_name);
    let config_path = if given.exists() {
        given
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };

    let file = File::open(&config_path).with_context(|| format!("opening {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig =
        serde_yaml::from_reader(reader).with_context(|| format!("parsing {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn print_results(scenario: &Scenario) {
    for (i, p) in scenario.solver.node_positions().iter().enumerate() {
        println!("node {i:4}: [{:10.6}, {:10.6}, {:10.6}]", p.x, p.y, p.z);
    }
    for (name, outputs) in scenario.solver.goal_outputs() {
        if outputs.is_empty() {
            continue;
        }
        let values: Vec<String> = outputs
            .iter()
            .map(|o| match o {
                GoalOutput::Scalar(s) => format!("{s:.6}"),
                GoalOutput::Point(p) | GoalOutput::Vector(p) => {
                    format!("[{:.6}, {:.6}, {:.6}]", p.x, p.y, p.z)
                }
            })
            .collect();
        println!("{name}: {}", values.join(" "));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.bench {
        bench_iterate()?;
        bench_svd()?;
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let scenario = Scenario::build_scenario(scenario_cfg).context("building scenario")?;

    match args.background_ms {
        Some(ms) => {
            let Scenario { solver, execution } = scenario;
            let shared = Arc::new(Mutex::new(solver));
            let mut background = BackgroundExecution::start(
                Arc::clone(&shared),
                Some(Box::new(|positions: &[Triple]| tracing::debug!(nodes = positions.len(), "tick rendered"))),
            );
            std::thread::sleep(Duration::from_millis(ms));
            background.stop(Duration::from_secs(2))?;
            info!(ticks = background.ticks(), "background run finished");

            let solver = Arc::try_unwrap(shared)
                .map_err(|_| anyhow::anyhow!("solver still shared after background stop"))?
                .into_inner();
            print_results(&Scenario { solver, execution });
        }
        None => {
            let mut scenario = scenario;
            let report = scenario.run();
            println!(
                "iterations = {}, kinetic energy = {:.3e}, converged = {}",
                report.iterations, report.kinetic_energy, report.converged
            );
            print_results(&scenario);
        }
    }

    Ok(())
}
