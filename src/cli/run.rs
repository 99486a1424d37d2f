//! Run command implementation
//!
//! Replays a JSON-lines event script against the worker. After every event
//! the event lifetime extension is awaited, the same way a browser keeps the
//! worker alive until `waitUntil` work settles.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;

use crate::cache::MemoryCacheStore;
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::error::{Error, Result};
use crate::host::{HttpNetwork, StdoutClients, SystemClock, TerminalNotifier};
use crate::manifest::Manifest;
use crate::output::table::format_table;
use crate::worker::{
    Backends, CacheStore, Clock, Outcome, ReminderPlan, SnoozeOutcome, TaskSet, Worker,
    WorkerEvent,
};

/// Options of the `run` command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub events: Option<String>,
    pub root: String,
    pub in_memory: bool,
    pub origin: Option<String>,
    pub no_triggers: bool,
    pub windows: Vec<String>,
    pub wait: bool,
}

#[derive(Debug, Tabled)]
struct EventRow {
    #[tabled(rename = "#")]
    line: usize,
    #[tabled(rename = "EVENT")]
    event: String,
    #[tabled(rename = "RESULT")]
    result: String,
}

/// Parse an event script, skipping blank lines and `#` comments.
/// Each event is returned with its 1-based line number.
pub fn parse_events(script: &str) -> Result<Vec<(usize, WorkerEvent)>> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line.trim())
                .map(|event| (i + 1, event))
                .map_err(|e| Error::Other(format!("Invalid event on line {}: {}", i + 1, e)))
        })
        .collect()
}

fn read_script(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut script = String::new();
            std::io::stdin().read_to_string(&mut script)?;
            Ok(script)
        }
    }
}

fn describe_plan(plan: &ReminderPlan) -> String {
    match plan {
        ReminderPlan::Triggered { at } => format!("trigger at {}", at.format("%Y-%m-%d %H:%M")),
        ReminderPlan::Delayed { after } => format!("delayed display in {}s", after.as_secs()),
        ReminderPlan::AlreadyScheduled => "already scheduled".to_string(),
    }
}

/// One-line human summary of an outcome
pub fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Installed { precached, .. } => format!("precached {} resources", precached),
        Outcome::Activated {
            purged,
            reminder,
            clients_claimed,
        } => {
            let purged = if purged.is_empty() {
                "no stale caches".to_string()
            } else {
                format!("purged {}", purged.join(", "))
            };
            format!(
                "{}; reminder {}; {} clients claimed",
                purged,
                describe_plan(reminder),
                clients_claimed
            )
        }
        Outcome::Fetched(routed) => format!(
            "{} {} via {} policy from {}",
            routed.response.status,
            routed
                .response
                .content_type
                .as_deref()
                .unwrap_or("(no content type)"),
            routed.policy.as_str(),
            routed.source.as_str()
        ),
        Outcome::Synced { replayed } => format!("replayed {} API requests", replayed),
        Outcome::DailyReset {
            notified_clients,
            redisplayed,
        } => format!(
            "snooze reset, {} clients notified{}",
            notified_clients,
            if *redisplayed { ", reminder shown" } else { "" }
        ),
        Outcome::SnoozeReset => "snooze reset".to_string(),
        Outcome::Broadcast { notified_clients } => {
            format!("chart update sent to {} clients", notified_clients)
        }
        Outcome::ReminderShown { next } => format!("reminder shown; next {}", describe_plan(next)),
        Outcome::Snoozed(SnoozeOutcome::Snoozed { count, plan }) => {
            format!("snoozed ({}), {}", count, describe_plan(plan))
        }
        Outcome::Snoozed(SnoozeOutcome::LimitReached { count }) => {
            format!("snooze limit reached ({})", count)
        }
        Outcome::Opened { client, focused } => format!(
            "{} {} at {}",
            if *focused { "focused" } else { "opened" },
            client.id,
            client.url
        ),
        Outcome::Ignored { reason } => format!("ignored: {}", reason),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Replay the event script against a freshly started worker
pub async fn run(opts: &GlobalOptions, run_opts: RunOptions) -> Result<()> {
    let config = opts.load_config()?;
    let manifest = Manifest::scan(Path::new(&run_opts.root), &config.manifest)?;
    let events = parse_events(&read_script(run_opts.events.as_deref())?)?;

    let origin = run_opts
        .origin
        .clone()
        .unwrap_or_else(|| config.host.origin.clone());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let caches: Arc<dyn CacheStore> = if run_opts.in_memory {
        Arc::new(MemoryCacheStore::new())
    } else {
        Arc::new(opts.open_store()?)
    };
    let trigger_tasks = TaskSet::new();
    let mut notifier = TerminalNotifier::new(clock.clone());
    if !run_opts.no_triggers {
        notifier = notifier.with_triggers(trigger_tasks.clone());
    }

    let backends = Backends {
        caches,
        network: Arc::new(HttpNetwork::new(&origin)?),
        notifier: Arc::new(notifier),
        clients: Arc::new(StdoutClients::new(run_opts.windows.clone())),
        clock,
    };
    let worker = Worker::new(Arc::new(config), Arc::new(manifest), backends);
    log::info!("Replaying {} events against {}", events.len(), origin);

    let mut rows = Vec::new();
    let mut failures = 0;
    for (line, event) in events {
        let kind = event.kind();
        let result = worker.dispatch(event).await;
        let settled = worker.settle().await;
        if settled > 0 {
            log::debug!("Settled {} background tasks after {}", settled, kind);
        }

        match (&result, opts.format) {
            (Ok(outcome), OutputFormat::Json) => {
                let mut json = serde_json::to_value(outcome)?;
                json["line"] = serde_json::json!(line);
                json["event"] = serde_json::json!(kind);
                println!("{}", serde_json::to_string(&json)?);
            }
            (Ok(outcome), OutputFormat::Table) => rows.push(EventRow {
                line,
                event: kind.to_string(),
                result: describe(outcome),
            }),
            (Ok(outcome), OutputFormat::Pretty) => {
                println!("{} {}", format!("[{}]", kind).cyan().bold(), describe(outcome));
            }
            (Err(e), OutputFormat::Json) => {
                let json = serde_json::json!({
                    "line": line,
                    "event": kind,
                    "outcome": "error",
                    "error": e.to_string(),
                });
                println!("{}", serde_json::to_string(&json)?);
            }
            (Err(e), OutputFormat::Table) => rows.push(EventRow {
                line,
                event: kind.to_string(),
                result: format!("error: {}", e),
            }),
            (Err(e), OutputFormat::Pretty) => {
                println!("{} {}", format!("[{}]", kind).red().bold(), e);
            }
        }

        if let Err(e) = result {
            log::error!("Event on line {} failed: {}", line, e);
            failures += 1;
        }
    }

    if matches!(opts.format, OutputFormat::Table) {
        println!("{}", format_table(&rows));
    }

    let pending = worker.pending() + trigger_tasks.pending();
    if run_opts.wait && pending > 0 {
        let progress = spinner(&format!("Waiting for {} pending reminders", pending));
        worker.settle().await;
        trigger_tasks.settle().await;
        progress.finish_and_clear();
    } else {
        let aborted = worker.terminate() + trigger_tasks.abort_all();
        if aborted > 0 {
            log::info!("Dropped {} pending reminder timers on exit", aborted);
        }
    }

    if failures > 0 {
        return Err(Error::Other(format!("{} events failed", failures)));
    }
    Ok(())
}
