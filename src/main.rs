use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use swipeclean_sync::handlers::{self, config::ConfigChanges, AppContext};
use swipeclean_sync::logger;
use swipeclean_sync::settings::KeptPolicyKind;

#[derive(Parser)]
#[command(name = "swipeclean-sync")]
#[command(about = "Track photo triage decisions and sync them across devices", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show statistics and sync state
    Status,

    /// Mark an asset as kept
    Keep {
        /// Asset ID
        id: String,
    },

    /// Remove an asset's kept mark so it is triaged again
    Unkeep {
        /// Asset ID
        id: String,
    },

    /// Record that an asset was deleted
    Delete {
        /// Asset ID
        id: String,

        /// Bytes freed by the deletion
        #[arg(long, default_value_t = 0)]
        bytes: i64,
    },

    /// List (or interactively work through) assets needing a decision
    Triage {
        /// Library directory; files are assets, top-level folders are albums
        #[arg(short, long)]
        dir: PathBuf,

        /// Only triage this album
        #[arg(short, long)]
        album: Option<String>,

        /// Earliest creation date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest creation date (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Keep or delete each asset in turn
        #[arg(short, long)]
        interactive: bool,
    },

    /// Run one sync cycle
    Sync,

    /// Sync periodically until Ctrl-C
    Watch {
        /// Seconds between cycles (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Forget decisions
    Reset {
        /// Only reset this album (local only)
        #[arg(short, long, requires = "dir")]
        album: Option<String>,

        /// Library directory used to list the album
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Configure sync settings
    Config {
        /// Turn sync on and run a first cycle
        #[arg(long)]
        enable_sync: bool,

        /// Turn sync off
        #[arg(long)]
        disable_sync: bool,

        /// Seconds between periodic syncs
        #[arg(long)]
        interval: Option<u64>,

        /// Kept policy: permanent or cooldown
        #[arg(long)]
        policy: Option<KeptPolicyKind>,

        /// Days before a kept asset returns under the cooldown policy
        #[arg(long)]
        cooldown_days: Option<u32>,

        /// Shared directory used as the remote
        #[arg(long)]
        remote: Option<PathBuf>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// View sync and reset history
    History {
        /// Number of operations to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Clear the history instead
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logger::rotate_log_if_needed() {
        eprintln!("Warning: failed to rotate log file: {e:#}");
    }
    logger::init_logger()?;

    // History does not need the store or the remote
    if let Commands::History { limit, clear } = cli.command {
        return if clear {
            handlers::handle_history_clear()
        } else {
            handlers::handle_history_list(limit)
        };
    }

    let ctx = AppContext::open()?;

    match cli.command {
        Commands::Status => handlers::handle_status(&ctx)?,
        Commands::Keep { id } => handlers::handle_keep(&ctx, &id)?,
        Commands::Unkeep { id } => handlers::handle_unkeep(&ctx, &id)?,
        Commands::Delete { id, bytes } => handlers::handle_delete(&ctx, &id, bytes)?,
        Commands::Triage {
            dir,
            album,
            from,
            to,
            interactive,
        } => handlers::handle_triage(&ctx, &dir, album, from, to, interactive)?,
        Commands::Sync => handlers::handle_sync(&ctx).await?,
        Commands::Watch { interval } => handlers::handle_watch(&ctx, interval).await?,
        Commands::Reset { album, dir, yes } => {
            handlers::handle_reset(&ctx, album.as_deref(), dir.as_deref(), yes).await?
        }
        Commands::Config {
            enable_sync,
            disable_sync,
            interval,
            policy,
            cooldown_days,
            remote,
            show,
        } => {
            let changes = ConfigChanges {
                enable_sync,
                disable_sync,
                interval,
                policy,
                cooldown_days,
                remote,
                show,
            };
            handlers::handle_config(&ctx, changes).await?
        }
        Commands::History { .. } => {}
    }

    Ok(())
}
