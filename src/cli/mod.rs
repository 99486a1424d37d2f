//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod args;
pub mod cache;
pub mod generate;
pub mod init;
pub mod manifest;
pub mod run;
pub mod status;

pub use args::{GlobalOptions, OutputFormat};

/// PulseMind service worker generator and offline runtime
#[derive(Parser, Debug)]
#[command(name = "pulsemind-sw")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "PULSEMIND_SW_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "PULSEMIND_SW_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "PULSEMIND_SW_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Override the cache database directory
    #[arg(long, global = true, env = "PULSEMIND_SW_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the project and write the service worker script
    Generate {
        /// Project root to scan
        #[arg(long, default_value = ".")]
        root: String,

        /// Output file (defaults to manifest.output from config, inside the root)
        #[arg(long, short = 'o')]
        output: Option<String>,
    },

    /// Print the precache manifest without writing anything
    Manifest {
        /// Project root to scan
        #[arg(long, default_value = ".")]
        root: String,
    },

    /// Replay platform events against the worker
    #[command(after_help = "\
EVENTS (JSON lines, one per line):
  {\"event\":\"install\"}
  {\"event\":\"activate\"}
  {\"event\":\"fetch\",\"url\":\"/api/readings\"}
  {\"event\":\"sync\",\"tag\":\"sync-gsr-data\"}
  {\"event\":\"periodic-sync\",\"tag\":\"daily-reminder\"}
  {\"event\":\"notification-click\",\"action\":\"snooze\"}
  {\"event\":\"message\",\"data\":{\"type\":\"TRIGGER_UPDATE\"}}")]
    Run {
        /// Event script to replay (reads stdin when omitted)
        #[arg(long, short = 'e')]
        events: Option<String>,

        /// Project root used to build the manifest
        #[arg(long, default_value = ".")]
        root: String,

        /// Keep caches in memory instead of the SQLite store
        #[arg(long)]
        in_memory: bool,

        /// Origin that bare request paths resolve against
        #[arg(long)]
        origin: Option<String>,

        /// Disable trigger emulation so reminders take the delayed-display path
        #[arg(long)]
        no_triggers: bool,

        /// Open window client URL (repeatable)
        #[arg(long = "window", short = 'w')]
        windows: Vec<String>,

        /// Wait for pending reminder timers before exiting
        #[arg(long)]
        wait: bool,
    },

    /// Show configuration, cache and reminder status
    Status,

    /// Manage the local cache database
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Create a configuration file interactively
    Init,

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   pulsemind-sw completion bash > /etc/bash_completion.d/pulsemind-sw
  zsh:    pulsemind-sw completion zsh > \"${fpath[1]}/_pulsemind-sw\"
  fish:   pulsemind-sw completion fish > ~/.config/fish/completions/pulsemind-sw.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show namespaces with entry counts and sizes
    Status,

    /// Delete every namespace
    Clear,

    /// Print the cache database directory
    Path,
}
