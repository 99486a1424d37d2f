//! Manifest command implementation

use std::path::Path;
use tabled::Tabled;

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::output::json::format_json;
use crate::output::table::format_table;

#[derive(Debug, Tabled)]
struct ManifestRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "KIND")]
    kind: &'static str,
}

fn kind(url: &str) -> &'static str {
    if url == "/" {
        "root"
    } else if url.starts_with("http://") || url.starts_with("https://") {
        "extra"
    } else {
        "file"
    }
}

/// Print the precache manifest for a project root
pub fn run(opts: &GlobalOptions, root: &str) -> Result<()> {
    let config = opts.load_config()?;
    let manifest = Manifest::scan(Path::new(root), &config.manifest)?;

    match opts.format {
        OutputFormat::Json => println!("{}", format_json(&manifest)?),
        OutputFormat::Table => {
            let rows: Vec<ManifestRow> = manifest
                .urls()
                .iter()
                .enumerate()
                .map(|(index, url)| ManifestRow {
                    index,
                    url: url.clone(),
                    kind: kind(url),
                })
                .collect();
            println!("{}", format_table(&rows));
        }
        OutputFormat::Pretty => {
            for url in manifest.urls() {
                println!("{}", url);
            }
            eprintln!("{} entries", manifest.len());
        }
    }

    Ok(())
}
