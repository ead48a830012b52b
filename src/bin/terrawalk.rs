//! terrawalk - stop tracking resource instances without destroying them
//!
//! Usage:
//!   terrawalk forget --plan plan.json --state state.json   → forget planned instances
//!   terrawalk forget ... --dry-run                         → walk without writing state
//!   terrawalk show --state state.json                      → list tracked instances
//!   terrawalk version                                      → show version

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use terrawalk::{run_forget, ForgetOptions, TerrawalkConfig, DEFAULT_CONFIG_FILE};
use terrawalk_graph::FileStateStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "terrawalk",
    about = "Remove resource instances from state without destroying them",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Forget every instance the plan marks for forgetting
    Forget {
        /// Saved plan (JSON)
        #[arg(long)]
        plan: PathBuf,
        /// State file (JSON); created if missing
        #[arg(long)]
        state: PathBuf,
        /// Path to config file (TOML)
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Maximum nodes executing at once (overrides config)
        #[arg(long)]
        parallelism: Option<usize>,
        /// Walk the graph but leave the state file untouched
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// List the instances tracked in a state file
    Show {
        #[arg(long)]
        state: PathBuf,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Forget {
            plan,
            state,
            config,
            parallelism,
            dry_run,
        } => {
            let config = TerrawalkConfig::load(&config);
            let opts = ForgetOptions {
                plan_path: plan,
                state_path: state,
                parallelism,
                dry_run,
            };
            forget(&config, &opts).await?;
        }

        Commands::Show { state } => {
            let store = FileStateStore::open(&state).await?;
            for res in store.resources().await {
                match &res.provider {
                    Some(p) => println!("{}  {}", res.addr, p),
                    None => println!("{}", res.addr),
                }
            }
        }

        Commands::Version => {
            println!("terrawalk v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn init_tracing(
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "terrawalk=info,terrawalk_graph=info".into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => std::path::Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("--log-file must name a file: {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

async fn forget(config: &TerrawalkConfig, opts: &ForgetOptions) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after running nodes finish");
            on_signal.cancel();
        }
    });

    let report = run_forget(config, opts, cancel).await?;
    for addr in &report.forgotten {
        println!("forgot {}", addr);
    }
    for diag in &report.summary.diagnostics {
        eprintln!("{}", diag);
    }
    if let Some(state) = &report.persisted {
        println!(
            "state serial {} written ({} instance(s) tracked)",
            state.serial,
            state.resources.len()
        );
    }

    if !report.summary.success() {
        anyhow::bail!(
            "forget walk finished with errors: {} failed, {} skipped",
            report.summary.failed,
            report.summary.skipped
        );
    }
    Ok(())
}
