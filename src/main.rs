//! revisio CLI - Bayesian hypothesis-revision simulator.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use revisio::models::ResponseDistribution;
use revisio::pipeline::{load_human_responses, write_records_jsonl};
use revisio::{
    ChainPool, Config, ExperimentConfig, FeatureSpace, FitPipeline, Stimuli, SweepPipeline,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "revisio")]
#[command(author = "Infernet <dev@infernet.org>")]
#[command(version)]
#[command(about = "Bayesian hypothesis-revision simulator (MCMC over conjunctive concepts)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, global = true, default_value = "revisio.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full sweep: baseline, cueing, chain-length and temperature
    Sweep {
        /// Path to stimuli JSON file
        #[arg(short, long)]
        stimuli: PathBuf,

        /// Output directory (overrides [output] dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a single condition
    Run {
        /// Path to stimuli JSON file
        #[arg(short, long)]
        stimuli: PathBuf,

        /// Probability of an additive move
        #[arg(long, default_value = "0.5", allow_hyphen_values = true)]
        p_add: f64,

        /// Chain length
        #[arg(long, default_value = "500", allow_hyphen_values = true)]
        steps: i64,

        /// Acceptance temperature
        #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
        temperature: f64,

        /// Chains per trial
        #[arg(long, default_value = "50", allow_hyphen_values = true)]
        chains: i64,

        /// Base seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Write chain records to this JSONL file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit sampler parameters to human responses by grid search
    Fit {
        /// Path to stimuli JSON file
        #[arg(short, long)]
        stimuli: PathBuf,

        /// Directory of participant response files
        #[arg(long)]
        human: PathBuf,

        /// Output directory (overrides [output] dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration and stimuli
    Validate {
        /// Path to stimuli JSON file
        #[arg(short, long)]
        stimuli: PathBuf,
    },

    /// Show example configuration
    Example,
}

/// `RUST_LOG` wins when set and valid; otherwise `--verbose` picks DEBUG over INFO.
fn log_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    env.filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

fn setup_logging(verbose: bool) -> Result<()> {
    let env = std::env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(verbose, env.as_deref()))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn print_example_config() {
    let example = r#"# revisio configuration file

# Base seed; every chain's random stream is derived from it
seed = 0

[pool]
size = 8

[defaults]
p_add = 0.5
steps = 500
temperature = 1.0

[baseline]
num_chains = 50

[cueing]
values = [0.1, 0.3, 0.5, 0.7, 0.9]
num_chains = 30

[cog_steps]
values = [50, 150, 300, 500, 800]
num_chains = 30

[cog_temp]
values = [1.0, 1.5, 2.0, 3.0]
num_chains = 30

[fit]
p_add = [0.1, 0.3, 0.5, 0.7, 0.9]
steps = [100, 200, 500, 800]
temperature = [0.5, 1.0, 1.5, 2.0]
num_chains = 50
condition = "normal"
metric = "kl"  # kl | l2 | cross_entropy

[output]
dir = "results"
write_chains = true
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!("No config file at {:?}, using defaults", path);
    }
    Config::from_file_or_default(path).with_context(|| format!("Failed to load config from {:?}", path))
}

fn load_trials(path: &Path) -> Result<Vec<revisio::BoundTrial>> {
    let stimuli = Stimuli::from_file(path)
        .with_context(|| format!("Failed to load stimuli from {:?}", path))?;
    stimuli
        .bind(FeatureSpace::standard())
        .context("Invalid stimuli")
}

fn print_distribution(name: &str, dist: &ResponseDistribution) {
    println!(
        "{:<28} add {:>5.1}%  sub {:>5.1}%  mixed {:>5.1}%  none {:>5.1}%",
        name,
        dist.additive * 100.0,
        dist.subtractive * 100.0,
        dist.mixed * 100.0,
        dist.nochange * 100.0
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate { stimuli } => {
            let config = load_config(&cli.config)?;
            config.validate().context("Invalid configuration")?;
            let trials = load_trials(&stimuli)?;

            info!("Configuration and stimuli are valid");
            info!("  Trials: {}", trials.len());
            info!(
                "  Examples: {}",
                trials.iter().map(|t| t.examples.len()).sum::<usize>()
            );
            info!("  Pool size: {}", config.pool.size);
            info!("  Seed: {}", config.seed);
            return Ok(());
        }

        Commands::Sweep {
            stimuli,
            output,
            seed,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let dir = output.unwrap_or_else(|| config.output.dir.clone());
            let trials = load_trials(&stimuli)?;

            let pipeline = SweepPipeline::new(config, trials)?.with_progress(!cli.quiet);
            let (report, conditions) = pipeline.run().await?;
            pipeline.write_outputs(&dir, &report, &conditions)?;

            println!("\n=== Sweep Complete ===");
            for summary in &report.conditions {
                let name = format!("{} {}", summary.family.as_str(), summary.label);
                print_distribution(&name, &summary.distribution);
            }
            println!("Runtime:     {:.1}s", report.runtime_secs);
            println!("Output:      {dir:?}");
        }

        Commands::Run {
            stimuli,
            p_add,
            steps,
            temperature,
            chains,
            seed,
            output,
        } => {
            let config = load_config(&cli.config)?;
            let experiment = ExperimentConfig::new(p_add, steps, temperature, chains)?;
            let trials = load_trials(&stimuli)?;

            let pool = ChainPool::new(
                FeatureSpace::shared(),
                Arc::new(trials),
                config.pool.size,
                seed.unwrap_or(config.seed),
            );
            let records = pool.run_condition(experiment, 0).await?;

            if let Some(path) = &output {
                write_records_jsonl(path, &records)?;
            }

            let dist = ResponseDistribution::from_labels(records.iter().map(|r| &r.response_type));
            println!("\n=== Condition Complete ===");
            print_distribution(&experiment.label(), &dist);
            println!("Chains:      {}", records.len());
            if let Some(path) = output {
                println!("Output:      {path:?}");
            }
        }

        Commands::Fit {
            stimuli,
            human,
            output,
        } => {
            let config = load_config(&cli.config)?;
            let dir = output.unwrap_or_else(|| config.output.dir.clone());
            let trials = load_trials(&stimuli)?;
            let responses = load_human_responses(&human)
                .with_context(|| format!("Failed to load human responses from {:?}", human))?;

            let pipeline = FitPipeline::new(config, trials)?.with_progress(!cli.quiet);
            let report = pipeline.run(&responses).await?;
            pipeline.write_outputs(&dir, &report)?;

            println!("\n=== Model Fit Complete ===");
            print_distribution("human", &report.human);
            print_distribution("best model", &report.best.model);
            println!("Grid points: {}", report.grid.len());
            println!(
                "Best:        p_add={} steps={} temperature={}",
                report.best.p_add, report.best.steps, report.best.temperature
            );
            println!("Loss:        {:.4}", report.best.loss);
            println!("Output:      {dir:?}");
        }
    }

    Ok(())
}
