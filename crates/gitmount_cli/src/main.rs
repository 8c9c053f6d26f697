//! gitmount CLI
//!
//! Command-line tools for gitmount repositories.
//!
//! # Commands
//!
//! - `serve` - Run a mount instance until interrupted
//! - `ping` - Check that an instance answers
//! - `lock` / `unlock` - Take or release a sync lease
//! - `info` - Describe a running mount
//! - `get-config` - Resolve a configuration key on the instance's host
//! - `sync` - Lock, run one commit/pull/push cycle, unlock

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Git-backed mount tools.
#[derive(Parser)]
#[command(name = "gitmount")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(global = true, short, long)]
    root: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mount instance until Ctrl-C or end of stdin
    Serve {
        /// Where the filesystem layer exposes the repository
        #[arg(short, long)]
        mount_point: Option<PathBuf>,

        /// Remote to synchronize with
        #[arg(short, long, default_value = "origin")]
        origin: String,

        /// Branch to synchronize
        #[arg(short, long, default_value = "master")]
        branch: String,

        /// Per-user install directory (default ~/.gitmount)
        #[arg(long)]
        install_dir: Option<PathBuf>,
    },

    /// Check that the instance answers
    Ping,

    /// Take a sync lease
    Lock {
        /// Keep renewing until Ctrl-C or end of stdin, then release
        #[arg(long)]
        hold: bool,

        /// Renewal interval in seconds while holding
        #[arg(long, default_value = "20")]
        renew_secs: u64,
    },

    /// Release this connection's sync lease
    Unlock,

    /// Describe the running mount
    Info {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Resolve a configuration key
    GetConfig {
        /// Key to resolve
        key: String,
    },

    /// Lock, run one commit/pull/push cycle, unlock
    Sync,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Serve {
            mount_point,
            origin,
            branch,
            install_dir,
        } => {
            let mount_point = mount_point.unwrap_or_else(|| root.clone());
            commands::serve::run(&root, &mount_point, &origin, &branch, install_dir)?;
        }
        Commands::Ping => commands::control::ping(&root)?,
        Commands::Lock { hold, renew_secs } => commands::control::lock(&root, hold, renew_secs)?,
        Commands::Unlock => commands::control::unlock(&root)?,
        Commands::Info { format } => commands::control::info(&root, &format)?,
        Commands::GetConfig { key } => commands::control::get_config(&root, &key)?,
        Commands::Sync => commands::sync::run(&root)?,
        Commands::Version => {
            println!("gitmount CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
