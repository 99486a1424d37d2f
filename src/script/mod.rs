//! Service worker script rendering
//!
//! The handler logic lives in `template.js`; rendering only substitutes the
//! constants, each encoded as a JSON literal so any string is a valid JS
//! expression.

use serde::Serialize;
use std::path::Path;

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::worker::scheduler::SNOOZE_KEY;

const TEMPLATE: &str = include_str!("template.js");

fn literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Render the worker script for a configuration and a frozen manifest
pub fn render(config: &WorkerConfig, manifest: &Manifest) -> Result<String> {
    let reminder = &config.reminder;
    let substitutions = [
        ("CACHE_NAME", literal(&config.cache.version)?),
        ("RUNTIME_CACHE", literal(&config.cache.runtime)?),
        ("PRECACHE_URLS", serde_json::to_string_pretty(manifest)?),
        ("API_MARKER", literal(&config.routes.api_marker)?),
        ("FALLBACK_URL", literal(&config.routes.fallback_url)?),
        ("NOTIFICATION_TITLE", literal(&reminder.title)?),
        ("NOTIFICATION_BODY", literal(&reminder.body)?),
        ("NOTIFICATION_ICON", literal(&reminder.icon)?),
        ("REMINDER_TAG", literal(&reminder.tag)?),
        ("SNOOZE_TAG", literal(&reminder.snooze_tag())?),
        ("REMINDER_HOUR", reminder.hour.to_string()),
        ("REMINDER_MINUTE", reminder.minute.to_string()),
        ("MAX_SNOOZE", reminder.max_snooze.to_string()),
        ("SNOOZE_MINUTES", reminder.snooze_minutes.to_string()),
        ("FALLBACK_DELAY_MS", (reminder.fallback_delay_secs * 1000).to_string()),
        ("REDISPLAY_ON_SYNC", reminder.redisplay_on_sync.to_string()),
        ("SNOOZE_KEY", literal(SNOOZE_KEY)?),
    ];

    let mut script = TEMPLATE.to_string();
    for (name, value) in substitutions {
        script = script.replace(&format!("{{{{{}}}}}", name), &value);
    }
    Ok(script)
}

/// Render and write the script, returning the number of precached entries
pub fn write(config: &WorkerConfig, manifest: &Manifest, path: &Path) -> Result<usize> {
    let script = render(config, manifest)?;
    std::fs::write(path, script)?;
    log::info!("Wrote {} ({} precache entries)", path.display(), manifest.len());
    Ok(manifest.len())
}
