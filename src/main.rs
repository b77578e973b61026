use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use motion_pretrain::config::{parse_override, Configuration, WarmStart};
use motion_pretrain::logging::init_logging;
use motion_pretrain::training::{
    ExperimentOrchestrator, ManualClock, Scheduler, SyntheticFramework, WarmupDecaySchedule,
    WarmupDecayScheduler,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "motion-pretrain")]
#[command(about = "Experiment configuration and run control for motion-policy pretraining", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "MOTION_PRETRAIN_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Configuration file plus dotted-path overrides
#[derive(Args)]
struct ConfigArgs {
    /// Experiment configuration (YAML, or JSON with a .json extension)
    config: PathBuf,

    /// Override a parameter, e.g. --set training_model_parameters.max_lr=1e-4
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the resolved experiment
    Validate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the resolved document as YAML
        #[arg(long)]
        print: bool,
    },

    /// Print the learning-rate schedule of an experiment
    Schedule {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of steps to print
        #[arg(long, default_value_t = 10_000)]
        steps: u64,

        /// Print every N-th step
        #[arg(long, default_value_t = 500)]
        every: u64,
    },

    /// Run the control loop against a synthetic framework on simulated time
    DryRun {
        #[command(flatten)]
        config: ConfigArgs,

        /// Optimisation steps per simulated epoch
        #[arg(long, default_value_t = 100)]
        steps_per_epoch: u64,

        /// Simulated wall-clock seconds per step
        #[arg(long, default_value_t = 1.0)]
        step_seconds: f64,

        /// Write checkpoints here instead of save_checkpoint_dir
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
    },

    /// Show build information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.json_logs).context("Failed to initialise logging")?;

    match cli.command {
        Commands::Validate { config, print } => validate_config(&config, print)?,
        Commands::Schedule { config, steps, every } => print_schedule(&config, steps, every)?,
        Commands::DryRun {
            config,
            steps_per_epoch,
            step_seconds,
            checkpoint_dir,
        } => dry_run(&config, steps_per_epoch, step_seconds, checkpoint_dir.as_deref()).await?,
        Commands::Info => show_info(),
    }

    Ok(())
}

fn load_config(args: &ConfigArgs) -> Result<Configuration> {
    let config = Configuration::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;
    if args.overrides.is_empty() {
        return Ok(config);
    }

    let overrides = args
        .overrides
        .iter()
        .map(|arg| parse_override(arg))
        .collect::<motion_pretrain::Result<Vec<_>>>()
        .context("Invalid --set override")?;
    for (key, value) in &overrides {
        info!("Override {} = {}", key, value);
    }
    config
        .with_overrides(overrides)
        .context("Configuration is invalid after overrides")
}

fn validate_config(args: &ConfigArgs, print: bool) -> Result<()> {
    info!("Validating configuration file: {}", args.config.display());
    let config = load_config(args)?;
    let run = config.run();
    let tm = config.training_model_parameters();
    let data = config.data_module_parameters();

    info!("Configuration is valid");
    info!("  - Experiment: {} ({})", run.experiment_name, run.description);
    info!("  - Model: {:?}, {} GPU(s)", run.model_variant, run.gpus);
    info!(
        "  - Learning rate: {:e} -> {:e}, {} warmup steps, decay {:?}",
        tm.min_lr, tm.max_lr, tm.warmup_steps, tm.decay_rate
    );
    info!(
        "  - Batches: train {}, val {}, {} workers{}",
        run.train_batch_size,
        run.val_batch_size,
        run.num_workers,
        if run.mintest { " (mintest)" } else { "" }
    );
    info!(
        "  - Checkpoints: every {} steps to {}",
        run.checkpoint_interval,
        run.checkpoint_dir().display()
    );
    info!(
        "  - Validation: every {} minutes, stop_early = {}",
        run.val_every_n_minutes, run.stop_early
    );
    info!("  - Data: {} ({})", data.data_dir.display(), data.train_trajectory_key);
    match &run.warm_start {
        WarmStart::Fresh => {}
        WarmStart::LoadWeights(path) => info!("  - Weights from {}", path.display()),
        WarmStart::Resume(path) => info!("  - Resuming from {}", path.display()),
    }

    if print {
        print!("{}", config.to_yaml()?);
    }
    Ok(())
}

fn print_schedule(args: &ConfigArgs, steps: u64, every: u64) -> Result<()> {
    if every == 0 {
        bail!("--every must be at least 1");
    }
    let config = load_config(args)?;
    let mut scheduler =
        WarmupDecayScheduler::new(WarmupDecaySchedule::from(config.training_model_parameters()));

    println!("{:>10}  {:>12}", "step", "lr");
    for step in (0..=steps).step_by(every as usize) {
        scheduler.seek(step);
        println!("{:>10}  {:>12.4e}", step, scheduler.get_lr());
    }
    Ok(())
}

async fn dry_run(
    args: &ConfigArgs,
    steps_per_epoch: u64,
    step_seconds: f64,
    checkpoint_dir: Option<&Path>,
) -> Result<()> {
    let step_duration = Duration::try_from_secs_f64(step_seconds)
        .context("--step-seconds must be a non-negative number of seconds")?;

    let mut config = load_config(args)?;
    if let Some(dir) = checkpoint_dir {
        config = config
            .to_builder()
            .save_checkpoint_dir(dir)
            .build()
            .context("Invalid checkpoint directory")?;
    }

    let clock = ManualClock::new();
    let framework = SyntheticFramework::new(steps_per_epoch, config.run().seed)
        .with_step_duration(clock.clone(), step_duration);

    info!(
        "Dry run of {} on {} ({} steps per epoch, {}s per step)",
        config.run().experiment_name,
        std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        steps_per_epoch,
        step_seconds
    );
    let mut orchestrator = ExperimentOrchestrator::new(config, framework)
        .context("Failed to set up the experiment")?
        .with_clock(Arc::new(clock));
    let result = orchestrator.run().await.context("Dry run failed to start")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        warn!("Dry run did not complete");
        bail!(result.error_message.unwrap_or_else(|| "dry run failed".to_string()));
    }
    Ok(())
}

fn show_info() {
    println!("motion-pretrain {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Run control for motion-policy pretraining:");
    println!("  - validated, immutable experiment configuration (YAML/JSON)");
    println!("  - warmup/decay learning-rate schedule");
    println!("  - step-interval checkpoints and best-validation checkpoints");
    println!("  - wall-clock validation cadence");
    println!("  - epoch budget and opt-in early stopping");
    println!();
    println!("Usage:");
    println!("  motion-pretrain validate configs/pretrain.yaml");
    println!("  motion-pretrain schedule configs/pretrain.yaml --steps 20000 --every 1000");
    println!("  motion-pretrain dry-run configs/pretrain.yaml --checkpoint-dir /tmp/ckpt --set max_epochs=2");
    println!("  motion-pretrain info");
}
