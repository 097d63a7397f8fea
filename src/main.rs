#![recursion_limit = "256"]

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use burn::backend::{Autodiff, NdArray, Wgpu};
use burn::config::Config;
use burn::tensor::backend::AutodiffBackend;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use ballistic_ddpg::burnrl::base::{ElemType, Environment};
use ballistic_ddpg::burnrl::environments::{MountainCarContinuous, Pendulum};
use ballistic_ddpg::ddpg::{self, DdpgConfig};
use ballistic_ddpg::memory_game::{self, MemoryGameConfig};
use ballistic_ddpg::utils::create_artifact_dir;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Ndarray,
    Wgpu,
}

#[derive(Debug, Parser)]
#[command(name = "ballistic-ddpg", about = "DDPG and memory-game agents on burn", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train DDPG on a continuous-control environment.
    Ddpg(DdpgArgs),
    /// Train a memory agent on the memory game from expert episodes.
    MemoryGame(MemoryGameArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
struct RunArgs {
    /// Worker threads of the tensor backend, 0 keeps the backend default.
    #[arg(long, default_value_t = 1)]
    threads: usize,

    #[arg(long, value_enum, default_value_t = BackendArg::Ndarray)]
    backend: BackendArg,

    /// JSON config to start from; flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "artifacts")]
    artifact_dir: String,

    /// Evaluate a saved model instead of training.
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DdpgArgs {
    #[arg(long, default_value = "Pendulum-v1")]
    env: String,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    render_each: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    evaluate_each: Option<usize>,
    #[arg(long)]
    evaluate_for: Option<usize>,
    #[arg(long)]
    gamma: Option<f32>,
    #[arg(long)]
    hidden_layer_size: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    noise_sigma: Option<f32>,
    #[arg(long)]
    noise_theta: Option<f32>,
    #[arg(long)]
    target_tau: Option<f32>,
    #[arg(long)]
    max_episodes: Option<usize>,
    #[arg(long)]
    replay_capacity: Option<usize>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Args)]
struct MemoryGameArgs {
    #[arg(long)]
    cards: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    evaluate_each: Option<usize>,
    #[arg(long)]
    evaluate_for: Option<usize>,
    /// Defaults to 8 * cards.
    #[arg(long)]
    hidden_layer: Option<usize>,
    /// Defaults to 2 * cards.
    #[arg(long)]
    memory_cells: Option<usize>,
    /// Defaults to 3 * cards / 2.
    #[arg(long)]
    memory_cell_size: Option<usize>,
    #[arg(long)]
    max_episodes: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    render_each: Option<usize>,

    #[command(flatten)]
    run: RunArgs,
}

fn load_config<C: Config>(path: Option<&Path>, default: impl FnOnce() -> C) -> anyhow::Result<C> {
    match path {
        Some(path) => {
            C::load(path).map_err(|err| anyhow!("failed to load config {}: {err:?}", path.display()))
        }
        None => Ok(default()),
    }
}

macro_rules! override_fields {
    ($config:ident, $args:ident, [$($field:ident),* $(,)?]) => {
        $(if let Some(value) = $args.$field {
            $config.$field = value;
        })*
    };
}

fn ddpg_config(args: &DdpgArgs) -> anyhow::Result<DdpgConfig> {
    let mut config = load_config(args.run.config.as_deref(), DdpgConfig::new)?;
    override_fields!(
        config,
        args,
        [
            seed,
            render_each,
            batch_size,
            evaluate_each,
            evaluate_for,
            gamma,
            hidden_layer_size,
            learning_rate,
            noise_sigma,
            noise_theta,
            target_tau,
            max_episodes,
            replay_capacity,
        ]
    );
    Ok(config)
}

fn memory_game_config(args: &MemoryGameArgs) -> anyhow::Result<MemoryGameConfig> {
    let mut config = load_config(args.run.config.as_deref(), MemoryGameConfig::new)?;
    override_fields!(
        config,
        args,
        [
            cards,
            batch_size,
            evaluate_each,
            evaluate_for,
            max_episodes,
            learning_rate,
            seed,
            render_each,
        ]
    );
    if args.hidden_layer.is_some() {
        config.hidden_layer = args.hidden_layer;
    }
    if args.memory_cells.is_some() {
        config.memory_cells = args.memory_cells;
    }
    if args.memory_cell_size.is_some() {
        config.memory_cell_size = args.memory_cell_size;
    }
    Ok(config)
}

fn run_ddpg<B, E>(env: E, config: &DdpgConfig, args: &DdpgArgs, device: &B::Device) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    E: Environment<ActionType = Vec<ElemType>>,
{
    if let Some(checkpoint) = &args.run.checkpoint {
        let summary = ddpg::evaluate_checkpoint::<B::InnerBackend, _>(env, config, checkpoint, device)?;
        info!("Checkpoint return {:.2} +-{:.2}", summary.mean, summary.std);
        return Ok(());
    }

    let (report, policy) = ddpg::train::<B, _>(env, config, device)?;
    let dir = create_artifact_dir(&args.run.artifact_dir, &format!("ddpg-{}", args.env))
        .context("failed to create the artifact directory")?;
    ddpg::save_artifacts(&policy, config, &dir)?;
    info!(
        "Finished after {} updates, final return {:.2} +-{:.2}",
        report.updates, report.summary.mean, report.summary.std
    );
    Ok(())
}

fn ddpg_on_backend<B: AutodiffBackend>(args: &DdpgArgs, device: &B::Device) -> anyhow::Result<()> {
    let config = ddpg_config(args)?;
    match args.env.as_str() {
        "Pendulum-v1" => run_ddpg::<B, _>(Pendulum::new(), &config, args, device),
        "MountainCarContinuous-v0" => {
            run_ddpg::<B, _>(MountainCarContinuous::new(), &config, args, device)
        }
        other => bail!(
            "unknown environment {other:?}, expected Pendulum-v1 or MountainCarContinuous-v0"
        ),
    }
}

fn memory_game_on_backend<B: AutodiffBackend>(
    args: &MemoryGameArgs,
    device: &B::Device,
) -> anyhow::Result<()> {
    let config = memory_game_config(args)?;
    if let Some(checkpoint) = &args.run.checkpoint {
        let summary = memory_game::evaluate_checkpoint::<B::InnerBackend>(&config, checkpoint, device)?;
        info!("Checkpoint return {:.2} +-{:.2}", summary.mean, summary.std);
        return Ok(());
    }

    let (report, policy) = memory_game::train::<B>(&config, device)?;
    let dir = create_artifact_dir(&args.run.artifact_dir, &format!("memory-game-{}", config.cards))
        .context("failed to create the artifact directory")?;
    memory_game::save_artifacts(&policy, &config, &dir)?;
    info!(
        "Finished after {} batches, final return {:.2} +-{:.2}",
        report.losses.len(),
        report.summary.mean,
        report.summary.std
    );
    Ok(())
}

/// Sizes the global rayon pool the ndarray backend runs on.
fn set_threads(threads: usize) -> anyhow::Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the backend thread pool")?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match &cli.command {
        Command::Ddpg(args) => {
            set_threads(args.run.threads)?;
            match args.run.backend {
                BackendArg::Ndarray => ddpg_on_backend::<Autodiff<NdArray>>(args, &Default::default()),
                BackendArg::Wgpu => ddpg_on_backend::<Autodiff<Wgpu>>(args, &Default::default()),
            }
        }
        Command::MemoryGame(args) => {
            set_threads(args.run.threads)?;
            match args.run.backend {
                BackendArg::Ndarray => {
                    memory_game_on_backend::<Autodiff<NdArray>>(args, &Default::default())
                }
                BackendArg::Wgpu => memory_game_on_backend::<Autodiff<Wgpu>>(args, &Default::default()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_game_args(flags: &[&str]) -> MemoryGameArgs {
        let mut argv = vec!["ballistic-ddpg", "memory-game"];
        argv.extend_from_slice(flags);
        match Cli::parse_from(argv).command {
            Command::MemoryGame(args) => args,
            Command::Ddpg(_) => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn memory_game_flags_override_defaults() {
        let args = memory_game_args(&["--learning-rate", "0.05", "--cards", "6", "--memory-cells", "3"]);
        let config = memory_game_config(&args).unwrap();

        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.cards, 6);
        assert_eq!(config.memory_cells, Some(3));
        assert_eq!(config.batch_size, MemoryGameConfig::new().batch_size);
    }

    #[test]
    fn ddpg_flags_override_defaults() {
        let cli = Cli::parse_from(["ballistic-ddpg", "ddpg", "--learning-rate", "0.01", "--threads", "2"]);
        let Command::Ddpg(args) = cli.command else {
            panic!("parsed the wrong subcommand");
        };
        let config = ddpg_config(&args).unwrap();

        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(args.run.threads, 2);
        assert_eq!(args.env, "Pendulum-v1");
    }

    #[test]
    fn thread_pool_is_configured_once() {
        assert!(set_threads(0).is_ok());
        assert!(set_threads(2).is_ok());
        assert!(set_threads(2).is_err());
    }
}
