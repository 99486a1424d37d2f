//! Cache management commands

use tabled::Tabled;

use crate::cache::storage::NamespaceStats;
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::error::Result;
use crate::output::json::format_json;
use crate::output::table::format_table;

#[derive(Debug, Tabled)]
struct NamespaceRow {
    #[tabled(rename = "NAMESPACE")]
    name: String,
    #[tabled(rename = "ENTRIES")]
    entries: usize,
    #[tabled(rename = "SIZE")]
    size: String,
    #[tabled(rename = "CREATED")]
    created: String,
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|d| {
            d.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

impl From<&NamespaceStats> for NamespaceRow {
    fn from(stats: &NamespaceStats) -> Self {
        Self {
            name: stats.name.clone(),
            entries: stats.entries,
            size: format_size(stats.size_bytes),
            created: format_timestamp(stats.created_at),
        }
    }
}

/// Show cache namespaces with their sizes
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let store = opts.open_store()?;
    let stats = store.stats()?;
    let path = store.db_path().display().to_string();

    let total_entries: usize = stats.iter().map(|s| s.entries).sum();
    let total_size: usize = stats.iter().map(|s| s.size_bytes).sum();

    match opts.format {
        OutputFormat::Json => {
            let namespaces: Vec<_> = stats
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "entries": s.entries,
                        "size_bytes": s.size_bytes,
                        "created_at_timestamp": s.created_at,
                    })
                })
                .collect();
            let json = serde_json::json!({
                "path": path,
                "namespaces": namespaces,
                "total_entries": total_entries,
                "total_size_bytes": total_size,
                "total_size_human": format_size(total_size),
            });
            println!("{}", format_json(&json)?);
        }
        OutputFormat::Table => {
            let rows: Vec<NamespaceRow> = stats.iter().map(NamespaceRow::from).collect();
            println!("{}", format_table(&rows));
        }
        OutputFormat::Pretty => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", path);
            println!("Namespaces:     {}", stats.len());
            println!("Entries:        {}", total_entries);
            println!("Total size:     {}", format_size(total_size));

            for s in &stats {
                println!(
                    "  {} - {} entries, {} (created {})",
                    s.name,
                    s.entries,
                    format_size(s.size_bytes),
                    format_timestamp(s.created_at)
                );
            }
        }
    }

    Ok(())
}

/// Delete every namespace
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let store = opts.open_store()?;
    let stats = store.clear_all()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "namespaces_removed": stats.namespaces_removed,
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", format_json(&json)?);
        }
        _ => {
            if stats.namespaces_removed > 0 {
                println!(
                    "Cleared {} namespaces ({} entries)",
                    stats.namespaces_removed, stats.entries_removed
                );
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    println!("{}", opts.cache_dir()?.display());
    Ok(())
}

/// Format bytes as human-readable size
fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
