use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cnn_dae::{
    backend::{create_device, get_backend_name, TrainBackend},
    pipeline,
    runtime::{init_tracing, ThreadHint},
    RunContext, TrainingConfig,
};

#[derive(Parser)]
#[command(name = "cnn-dae")]
#[command(about = "Train a CNN denoising autoencoder on ground-truth masks and denoise test predictions")]
struct Cli {
    /// Number of compute threads, -1 to leave unset
    #[arg(short = 'n', long = "num_cores", default_value_t = -1, allow_negative_numbers = true)]
    num_cores: i64,

    /// Tag appended to log directories, checkpoints and plots
    #[arg(short, long)]
    tag: Option<String>,

    /// JSON training configuration; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    ThreadHint::from_flag(cli.num_cores)
        .and_then(ThreadHint::apply)
        .context("failed to configure the thread pool")?;

    let config = match &cli.config {
        Some(path) => TrainingConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TrainingConfig::new(),
    };

    let run = RunContext::new(cli.tag);
    let device = create_device();
    tracing::info!(backend = get_backend_name(), tag = %run.tag_string(), "starting run");

    let report = pipeline::run::<TrainBackend>(&config, &run, &device).context("run failed")?;
    tracing::info!(
        steps = report.steps,
        checkpoint = %report.checkpoint.display(),
        "finished"
    );
    Ok(())
}
