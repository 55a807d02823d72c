//! poolvisor: run, check and inspect a worker-pool supervisor from a TOML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use poolvisor::{
    ConfigProvider, EnvironmentCheck, FileStatusStore, LimitsCheck, StatusSnapshot, StatusStore,
    SupervisorBuilder, TaskLauncher, TomlConfig, WorkerCatalog,
};

/// Pre-forking worker pool supervisor
#[derive(Parser)]
#[command(name = "poolvisor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind listeners, start the pools and supervise them until shutdown
    Run {
        /// Worker configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// Status snapshot path (overrides `[supervisor].status_file`)
        #[arg(short, long)]
        status_file: Option<PathBuf>,
        /// How units are started
        #[arg(short, long, value_enum, default_value_t = UnitKind::Task)]
        units: UnitKind,
    },
    /// Validate the configuration and the environment without starting anything
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the last status snapshot
    Status {
        #[arg(short, long)]
        status_file: PathBuf,
        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum UnitKind {
    /// In-process tasks running bundled implementations
    Task,
    /// Child processes running `worker_file` executables
    Process,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("POOLVISOR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Run {
            config,
            status_file,
            units,
        } => run(&config, status_file, units).await,
        Commands::Check { config } => check(&config),
        Commands::Status { status_file, json } => status(&status_file, json),
    }
}

async fn run(path: &Path, status_file: Option<PathBuf>, units: UnitKind) -> Result<()> {
    let file = TomlConfig::from_path(path)?;
    let mut cfg = file.supervisor_config();
    if status_file.is_some() {
        cfg.status_file = status_file;
    }
    info!(config = %path.display(), ?units, "starting poolvisor");

    let builder = SupervisorBuilder::new(cfg).with_config_provider(file);
    let builder = match units {
        UnitKind::Task => builder.with_launcher(TaskLauncher::new(WorkerCatalog::with_builtins())),
        UnitKind::Process => process_launcher(builder)?,
    };

    let mut sup = builder.build();
    sup.run().await.context("supervisor failed")?;
    Ok(())
}

#[cfg(unix)]
fn process_launcher(builder: SupervisorBuilder) -> Result<SupervisorBuilder> {
    Ok(builder.with_launcher(poolvisor::ProcessLauncher::new()))
}

#[cfg(not(unix))]
fn process_launcher(_builder: SupervisorBuilder) -> Result<SupervisorBuilder> {
    bail!("process units are only supported on unix")
}

fn check(path: &Path) -> Result<()> {
    let file = TomlConfig::from_path(path)?;
    let cfg = file.supervisor_config();
    let specs = file.workers()?;
    LimitsCheck::from_config(&cfg).check(&specs)?;

    for spec in &specs {
        let listen = spec
            .listen
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!(
            "{:<20} {:<32} x{:<5} {}",
            spec.name, listen, spec.desired_count, spec.implementation
        );
    }
    println!("configuration ok: {} worker(s)", specs.len());
    Ok(())
}

fn status(path: &Path, json: bool) -> Result<()> {
    let Some(snapshot) = FileStatusStore::new(path).read()? else {
        bail!("no status record at {}", path.display());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_status(&snapshot);
    }
    Ok(())
}

fn print_status(snapshot: &StatusSnapshot) {
    println!("start time: {}", snapshot.start_time);
    for (worker, units) in &snapshot.pid_map {
        let ids: Vec<String> = units.iter().map(ToString::to_string).collect();
        println!("{worker:<20} units: {:<4} [{}]", units.len(), ids.join(", "));
        if let Some(exits) = snapshot.exit_histogram.get(worker) {
            for (code, count) in exits {
                println!("{:<20}   exit {code:>4}: {count}", "");
            }
        }
    }
}
