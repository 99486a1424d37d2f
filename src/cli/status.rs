//! Status command implementation

use colored::Colorize;

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::error::Result;
use crate::host::SystemClock;
use crate::output::json::format_json;
use crate::worker::scheduler::{SNOOZE_KEY, reminder_time};
use crate::worker::{CacheStore, Clock, next_occurrence};

/// Read the persisted snooze counter, `None` when the store is unavailable
async fn stored_snooze_count(opts: &GlobalOptions, runtime: &str) -> Option<u32> {
    let store = match opts.open_store() {
        Ok(store) => store,
        Err(e) => {
            log::debug!("Cache store unavailable: {}", e);
            return None;
        }
    };
    match store.get(runtime, SNOOZE_KEY).await {
        Ok(Some(hit)) => Some(hit.body_text().trim().parse().unwrap_or(0)),
        Ok(None) => Some(0),
        Err(e) => {
            log::debug!("Could not read snooze counter: {}", e);
            None
        }
    }
}

/// Run the status command
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let config_path = opts.config_path();
    let config_exists = config_path.exists();
    let config = opts.load_config()?;

    let next = next_occurrence(SystemClock.now(), reminder_time(&config.reminder)?);
    let snooze_count = stored_snooze_count(opts, &config.cache.runtime).await;

    if opts.format == OutputFormat::Json {
        let json = serde_json::json!({
            "config_path": config_path.display().to_string(),
            "config_found": config_exists,
            "cache_name": config.cache.version,
            "runtime_cache": config.cache.runtime,
            "next_reminder": next.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "snooze_count": snooze_count,
            "max_snooze": config.reminder.max_snooze,
        });
        println!("{}", format_json(&json)?);
        return Ok(());
    }

    println!("{}\n", "PulseMind Service Worker Status".bold());

    if config_exists {
        println!(
            "{} Config file: {}",
            "✓".green(),
            config_path.display().to_string().cyan()
        );
    } else {
        println!(
            "{} No config at {} (using defaults)",
            "○".dimmed(),
            config_path.display()
        );
        println!("  → Run 'pulsemind-sw init' to create one");
    }

    println!("{} Precache: {}", "✓".green(), config.cache.version.bold());
    println!("{} Runtime:  {}", "✓".green(), config.cache.runtime.bold());
    println!(
        "{} Next reminder: {}",
        "✓".green(),
        next.format("%Y-%m-%d %H:%M").to_string().cyan()
    );

    match snooze_count {
        Some(count) if count >= config.reminder.max_snooze => println!(
            "{} Snoozed {}/{} (limit reached)",
            "⚠".yellow(),
            count,
            config.reminder.max_snooze
        ),
        Some(count) => println!(
            "{} Snoozed {}/{}",
            "○".dimmed(),
            count,
            config.reminder.max_snooze
        ),
        None => println!("{} Snooze counter unavailable", "✗".red()),
    }

    println!();
    Ok(())
}
