//! Generate command implementation

use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::output::json::format_json;
use crate::script;

/// Scan the project, render the worker script and write it
pub fn run(opts: &GlobalOptions, root: &str, output: Option<&str>) -> Result<()> {
    let mut config = opts.load_config()?;
    let root = Path::new(root);

    let output = match output {
        Some(path) => PathBuf::from(path),
        None => root.join(&config.manifest.output),
    };

    // Keep the output file out of the manifest even when it was given explicitly
    if let Ok(relative) = output.strip_prefix(root) {
        config.manifest.output = relative.to_string_lossy().replace('\\', "/");
    }

    let manifest = Manifest::scan(root, &config.manifest)?;
    let count = script::write(&config, &manifest, &output)?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "output": output.display().to_string(),
                "cache_name": config.cache.version,
                "precached": count,
            });
            println!("{}", format_json(&json)?);
        }
        _ => {
            let name = output
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| output.display().to_string());
            println!(
                "{} {} generated successfully with {} files to cache",
                "✓".green(),
                name,
                count
            );
        }
    }

    Ok(())
}
