mod commands;
mod handlers;
mod server;
mod storage;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keylease_core::config::{
    LockConfig, DEFAULT_CLEANUP_PROBABILITY, DEFAULT_INITIAL_WAIT_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_WAIT_MS, DEFAULT_TTL_MS,
};
use keylease_core::manager::LockManager;

use crate::commands::exit_codes;

#[derive(Parser)]
#[command(
    name = "keylease",
    about = "keylease: TTL locks that keep expensive per-key work from running twice",
    version
)]
struct Cli {
    /// Storage backend: "memory" or "sqlite:<path>"
    #[arg(long, global = true, default_value = "sqlite:keylease.db", env = "KEYLEASE_STORAGE")]
    storage: String,

    #[command(flatten)]
    lock: LockArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct LockArgs {
    /// Lock lifetime in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_TTL_MS, env = "KEYLEASE_TTL_MS")]
    ttl_ms: u64,

    /// First backoff sleep while waiting for a lock
    #[arg(long, global = true, default_value_t = DEFAULT_INITIAL_WAIT_MS, env = "KEYLEASE_INITIAL_WAIT_MS")]
    initial_wait_ms: u64,

    /// Backoff ceiling while waiting for a lock
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_WAIT_MS, env = "KEYLEASE_MAX_WAIT_MS")]
    max_wait_ms: u64,

    /// Number of polls before giving up on a held lock
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ATTEMPTS, env = "KEYLEASE_MAX_ATTEMPTS")]
    max_attempts: u32,

    /// Chance that an acquire sweeps expired locks first
    #[arg(long, global = true, default_value_t = DEFAULT_CLEANUP_PROBABILITY, env = "KEYLEASE_CLEANUP_PROBABILITY")]
    cleanup_probability: f64,
}

impl From<&LockArgs> for LockConfig {
    fn from(args: &LockArgs) -> Self {
        LockConfig {
            ttl_ms: args.ttl_ms,
            initial_wait_ms: args.initial_wait_ms,
            max_wait_ms: args.max_wait_ms,
            max_attempts: args.max_attempts,
            cleanup_probability: args.cleanup_probability,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Try to take a lock; exits 3 if someone else holds it
    Acquire {
        lock_key: String,
        /// Holder id recorded with the lock (generated if omitted)
        #[arg(long)]
        holder: Option<String>,
    },

    /// Release a lock
    Release {
        lock_key: String,
        /// Only release if this holder took the lock
        #[arg(long)]
        holder: Option<String>,
    },

    /// Show whether a lock is held, healing it if expired
    Status { lock_key: String },

    /// Block until a lock is released or expires; exits 3 on timeout
    Wait { lock_key: String },

    /// Delete every expired lock and print how many were removed
    Sweep,

    /// List stored locks, including expired ones not yet swept
    List,

    /// Run a command while holding a lock; exits 3 if the work was skipped
    Run {
        lock_key: String,
        /// Holder id recorded with the lock (generated if omitted)
        #[arg(long)]
        holder: Option<String>,
        /// Command and arguments to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Start the keylease HTTP coordination server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3100")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Seconds between background sweeps (0 disables)
        #[arg(long, default_value = "60", env = "KEYLEASE_SWEEP_INTERVAL_SECS")]
        sweep_interval_secs: u64,

        /// Maximum number of concurrently blocked wait requests
        #[arg(long, default_value = "256")]
        max_waiters: usize,

        /// Bearer token required on every route except /health
        #[arg(long, env = "KEYLEASE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    if let Commands::Version = cli.command {
        println!("keylease {}", env!("CARGO_PKG_VERSION"));
        println!("TTL lock coordination for expensive per-key work");
        return Ok(exit_codes::SUCCESS);
    }

    let store = storage::open_store(&cli.storage)?;
    let manager = LockManager::new(store, LockConfig::from(&cli.lock))?;

    match cli.command {
        Commands::Acquire { lock_key, holder } => {
            commands::acquire(&manager, &lock_key, holder.as_deref())
        }
        Commands::Release { lock_key, holder } => {
            commands::release(&manager, &lock_key, holder.as_deref())
        }
        Commands::Status { lock_key } => commands::status(&manager, &lock_key),
        Commands::Wait { lock_key } => {
            tokio::task::spawn_blocking(move || commands::wait(&manager, &lock_key)).await?
        }
        Commands::Sweep => commands::sweep(&manager),
        Commands::List => commands::list(&manager),
        Commands::Run {
            lock_key,
            holder,
            command,
        } => {
            tokio::task::spawn_blocking(move || {
                commands::run(&manager, &lock_key, holder.as_deref(), &command)
            })
            .await?
        }
        Commands::Serve {
            port,
            host,
            sweep_interval_secs,
            max_waiters,
            api_key,
        } => {
            server::run(
                manager,
                server::ServeOptions {
                    host,
                    port,
                    sweep_interval_secs,
                    max_waiters,
                    api_key,
                },
            )
            .await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Version => Ok(exit_codes::SUCCESS),
    }
}
