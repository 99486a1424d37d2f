//! Configuration management for pulsemind-sw
//!
//! One `WorkerConfig` is loaded at startup and shared (behind an `Arc`) by the
//! generator and by every handler of the worker runtime.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pulsemind-sw.yaml";

/// Worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Cache namespace names
    #[serde(default)]
    pub cache: CacheNames,

    /// Request routing options
    #[serde(default)]
    pub routes: RouteConfig,

    /// Daily reminder options
    #[serde(default)]
    pub reminder: ReminderConfig,

    /// Precache manifest options
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Runtime host options
    #[serde(default)]
    pub host: HostConfig,
}

/// Names of the two cache namespaces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheNames {
    /// Precache namespace, versioned per release
    #[serde(default = "default_cache_version")]
    pub version: String,

    /// Runtime namespace
    #[serde(default = "default_runtime_cache")]
    pub runtime: String,
}

fn default_cache_version() -> String {
    "pulsemind-v1.1.0".to_string()
}

fn default_runtime_cache() -> String {
    "runtime-pulsemind".to_string()
}

impl Default for CacheNames {
    fn default() -> Self {
        Self {
            version: default_cache_version(),
            runtime: default_runtime_cache(),
        }
    }
}

impl CacheNames {
    /// Names that survive activation
    pub fn current(&self) -> [&str; 2] {
        [self.version.as_str(), self.runtime.as_str()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteConfig {
    /// Substring marking API requests
    #[serde(default = "default_api_marker")]
    pub api_marker: String,

    /// Payload served when an API request fails with nothing cached
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
}

fn default_api_marker() -> String {
    "/api/".to_string()
}

fn default_fallback_url() -> String {
    "/pulsemind/assets/fallback-data.json".to_string()
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            api_marker: default_api_marker(),
            fallback_url: default_fallback_url(),
        }
    }
}

/// Reminder notification settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_body")]
    pub body: String,

    #[serde(default = "default_icon")]
    pub icon: String,

    /// Tag shared by every daily reminder
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Local wall-clock hour of the daily reminder
    #[serde(default = "default_hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,

    /// Hard ceiling on snoozes between two daily resets
    #[serde(default = "default_max_snooze")]
    pub max_snooze: u32,

    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,

    /// Delay of the degraded display used when triggers are unavailable
    #[serde(default = "default_fallback_delay_secs")]
    pub fallback_delay_secs: u64,

    /// Re-display the reminder on the daily/visibility sync
    #[serde(default)]
    pub redisplay_on_sync: bool,
}

fn default_title() -> String {
    "PulseMind".to_string()
}

fn default_body() -> String {
    "Time for your daily GSR check-in.".to_string()
}

fn default_icon() -> String {
    "/img/icon-192x192.png".to_string()
}

fn default_tag() -> String {
    "daily-reminder".to_string()
}

fn default_hour() -> u32 {
    8
}

fn default_max_snooze() -> u32 {
    3
}

fn default_snooze_minutes() -> u32 {
    10
}

fn default_fallback_delay_secs() -> u64 {
    30
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            icon: default_icon(),
            tag: default_tag(),
            hour: default_hour(),
            minute: 0,
            max_snooze: default_max_snooze(),
            snooze_minutes: default_snooze_minutes(),
            fallback_delay_secs: default_fallback_delay_secs(),
            redisplay_on_sync: false,
        }
    }
}

impl ReminderConfig {
    /// Tag used for snoozed reminders
    pub fn snooze_tag(&self) -> String {
        format!("{}-snooze", self.tag)
    }
}

/// Manifest generation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestConfig {
    /// Generated script file name, relative to the scanned root
    #[serde(default = "default_output")]
    pub output: String,

    /// Regexes matched against root-relative paths
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Absolute URLs appended after the scanned files
    #[serde(default)]
    pub extra: Vec<String>,
}

fn default_output() -> String {
    "sw.js".to_string()
}

fn default_exclude() -> Vec<String> {
    [
        r"^\.github/",
        r"^\.git/",
        r"\.md$",
        r"\.cff$",
        r"LICENSE$",
        r"pulsemind-sw\.ya?ml$",
        r"package(-lock)?\.json$",
        r"node_modules/",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            exclude: default_exclude(),
            extra: Vec::new(),
        }
    }
}

impl ManifestConfig {
    /// Compile the exclude list
    pub fn compiled_excludes(&self) -> Result<Vec<Regex>> {
        self.exclude
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::Pattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    }
                    .into()
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// Origin bare request paths are resolved against
    #[serde(default = "default_origin")]
    pub origin: String,
}

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
        }
    }
}

impl WorkerConfig {
    /// Resolve the config path (explicit path or `./pulsemind-sw.yaml`)
    pub fn resolve_path(path: Option<&str>) -> PathBuf {
        match path {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(path);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Reject values the worker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache.version.trim().is_empty() || self.cache.runtime.trim().is_empty() {
            return Err(ConfigError::Invalid("cache names must not be empty".to_string()).into());
        }
        if self.cache.version == self.cache.runtime {
            return Err(ConfigError::Invalid(
                "precache and runtime cache names must differ".to_string(),
            )
            .into());
        }
        if self.routes.api_marker.is_empty() {
            return Err(ConfigError::Invalid("api_marker must not be empty".to_string()).into());
        }
        if self.reminder.hour > 23 || self.reminder.minute > 59 {
            return Err(ConfigError::Invalid(format!(
                "reminder time {:02}:{:02} is not a valid time of day",
                self.reminder.hour, self.reminder.minute
            ))
            .into());
        }
        self.manifest.compiled_excludes()?;
        Ok(())
    }
}
