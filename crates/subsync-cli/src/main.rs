// subsync entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing (log to file, stdout carries JSON output)
// 3. Load config, build HTTP client and engine
// 4. Run the requested command and print its result

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use subsync_cli::{commands, config};
use subsync_core::ExecutionPolicy;

/// Plan and apply fantasy soccer lineup substitutions.
#[derive(Parser, Debug)]
#[command(name = "subsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config/ and defaults/
    #[arg(long, global = true, env = "SUBSYNC_HOME")]
    home: Option<PathBuf>,

    /// Team to operate on (defaults to league.team_id)
    #[arg(long, global = true)]
    team: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the current roster, eligibility and formation
    Show,
    /// Plan the swaps needed to reach a lineup
    Plan {
        /// Comma separated ids of the eleven desired starters
        #[arg(long)]
        lineup: String,
    },
    /// Swap one starter for one bench player
    Swap {
        /// Starter to bench
        #[arg(long = "out")]
        out_id: String,
        /// Bench player to start
        #[arg(long = "in")]
        in_id: String,
        /// Stop on lock conflicts instead of skipping
        #[arg(long)]
        strict: bool,
        /// Plan only, send nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply a full lineup
    Apply {
        /// Comma separated ids of the eleven desired starters
        #[arg(long)]
        lineup: String,
        /// Stop at the first lock conflict or failed swap
        #[arg(long)]
        strict: bool,
        /// Plan only, send nothing
        #[arg(long)]
        dry_run: bool,
    },
}

impl Commands {
    fn strict(&self) -> bool {
        matches!(
            self,
            Commands::Swap { strict: true, .. } | Commands::Apply { strict: true, .. }
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let home = match cli.home {
        Some(home) => home,
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };

    init_tracing(&home)?;
    info!("subsync starting up");

    let config = config::load_config(&home).context("failed to load configuration")?;
    let team_id = cli.team.unwrap_or_else(|| config.league.team_id.clone());
    info!(
        league_id = %config.league.league_id,
        team_id = %team_id,
        "config loaded"
    );
    if config.credentials.cookie.is_none() {
        info!("no session cookie configured; requests will be anonymous");
    }

    let policy = if cli.command.strict() {
        ExecutionPolicy::Strict
    } else {
        config.policy()
    };
    let http = commands::build_http_client(&config)?;
    let engine = commands::build_engine(&config, http, policy);

    let output = match cli.command {
        Commands::Show => commands::show(&engine, &team_id).await,
        Commands::Plan { lineup } => {
            commands::plan(&engine, &team_id, &commands::parse_lineup(&lineup)).await
        }
        Commands::Swap {
            out_id,
            in_id,
            dry_run,
            ..
        } => commands::swap(&engine, &team_id, &out_id, &in_id, dry_run).await,
        Commands::Apply {
            lineup, dry_run, ..
        } => {
            commands::apply(&engine, &team_id, &commands::parse_lineup(&lineup), dry_run).await
        }
    };

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            error!("command failed: {e:#}");
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    info!("subsync finished");
    Ok(())
}

/// Initialize tracing to log to a file so stdout stays machine-readable.
fn init_tracing(home: &std::path::Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = home.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("subsync.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("subsync=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
