//! pulsemind-sw - service worker generator and offline runtime for PulseMind

use clap::{CommandFactory, Parser};

mod cache;
mod cli;
mod config;
mod error;
mod host;
mod manifest;
mod output;
mod script;
mod worker;

use cli::args::GlobalOptions;
use cli::run::RunOptions;
use cli::{CacheCommands, Cli, Commands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Generate { root, output } => cli::generate::run(&opts, &root, output.as_deref()),
        Commands::Manifest { root } => cli::manifest::run(&opts, &root),
        Commands::Run {
            events,
            root,
            in_memory,
            origin,
            no_triggers,
            windows,
            wait,
        } => {
            let run_opts = RunOptions {
                events,
                root,
                in_memory,
                origin,
                no_triggers,
                windows,
                wait,
            };
            cli::run::run(&opts, run_opts).await
        }
        Commands::Status => cli::status::run(&opts).await,
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
        },
        Commands::Init => cli::init::run(&opts),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
