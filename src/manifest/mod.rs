//! Precache manifest construction
//!
//! Walks the project tree and collects every file that is not excluded,
//! as a root-relative URL path. The root `/` always comes first.

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::ManifestConfig;
use crate::error::Result;

/// Ordered list of URLs frozen into a worker version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Manifest {
    urls: Vec<String>,
}

impl Manifest {
    /// Build a manifest from scanned files, prepending the root entry
    pub fn new<I: IntoIterator<Item = String>>(files: I) -> Self {
        let mut urls = vec!["/".to_string()];
        urls.extend(files);
        Self { urls }
    }

    /// Scan `root` with the configured exclusions and append the extra URLs
    pub fn scan(root: &Path, config: &ManifestConfig) -> Result<Self> {
        let mut excludes = config.compiled_excludes()?;
        // The generated script itself is never precached
        excludes.push(Regex::new(&format!("^{}$", regex::escape(&config.output))).map_err(
            |e| crate::error::ConfigError::Pattern {
                pattern: config.output.clone(),
                reason: e.to_string(),
            },
        )?);

        let files = collect_files(root, &excludes)?;
        log::debug!("Scanned {} files under {}", files.len(), root.display());

        let mut manifest = Self::new(files);
        manifest.urls.extend(config.extra.iter().cloned());
        Ok(manifest)
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Number of entries, including the root
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Whether a request target is a precached static asset.
    ///
    /// Entries match by substring containment. The root entry only matches a
    /// request for the root path itself.
    pub fn matches(&self, target: &str) -> bool {
        let path = request_path(target);
        self.urls.iter().any(|url| {
            if url == "/" {
                path == "/"
            } else {
                target.contains(url.as_str())
            }
        })
    }
}

impl From<Vec<String>> for Manifest {
    fn from(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

/// Path component of a request target, without query or fragment
pub fn request_path(target: &str) -> &str {
    let without_scheme = match target.find("://") {
        Some(idx) => {
            let rest = &target[idx + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => target,
    };
    let end = without_scheme
        .find(['?', '#'])
        .unwrap_or(without_scheme.len());
    &without_scheme[..end]
}

/// Root-relative paths of every non-excluded file, in sorted pre-order
fn collect_files(root: &Path, excludes: &[Regex]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => continue,
        };

        if excludes.iter().any(|re| re.is_match(&relative)) {
            log::trace!("Excluded {}", relative);
        } else {
            files.push(format!("/{}", relative));
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "index.html");
        touch(root, "img/icon-192x192.png");
        touch(root, "data/gsr.json");
        touch(root, "README.md");
        touch(root, "CITATION.cff");
        touch(root, "LICENSE");
        touch(root, "package.json");
        touch(root, "package-lock.json");
        touch(root, "node_modules/chart/index.js");
        touch(root, ".git/HEAD");
        touch(root, ".github/workflows/ci.yml");
        touch(root, "pulsemind-sw.yaml");
        touch(root, "sw.js");
        dir
    }

    #[test]
    fn test_scan_applies_exclusions() {
        let dir = project();
        let manifest = Manifest::scan(dir.path(), &ManifestConfig::default()).unwrap();

        assert_eq!(
            manifest.urls(),
            &[
                "/".to_string(),
                "/data/gsr.json".to_string(),
                "/img/icon-192x192.png".to_string(),
                "/index.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_scan_walks_nested_dirs_in_name_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.js");
        touch(dir.path(), "a/z.css");
        touch(dir.path(), "a/b/c.png");
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let manifest = Manifest::scan(dir.path(), &ManifestConfig::default()).unwrap();

        assert_eq!(manifest.urls(), &["/", "/a/b/c.png", "/a/z.css", "/b.js"]);
    }

    #[test]
    fn test_scan_appends_extra_urls() {
        let dir = project();
        let config = ManifestConfig {
            extra: vec!["https://cdn.example.com/chart.min.js".to_string()],
            ..Default::default()
        };
        let manifest = Manifest::scan(dir.path(), &config).unwrap();

        assert_eq!(manifest.urls().first().unwrap(), "/");
        assert_eq!(
            manifest.urls().last().unwrap(),
            "https://cdn.example.com/chart.min.js"
        );
    }

    #[test]
    fn test_empty_tree_still_has_root() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::scan(dir.path(), &ManifestConfig::default()).unwrap();
        assert_eq!(manifest.urls(), &["/".to_string()]);
    }

    #[test]
    fn test_matches_by_containment() {
        let manifest = Manifest::new(vec!["/index.html".to_string()]);
        assert!(manifest.matches("/index.html"));
        assert!(manifest.matches("http://localhost:8080/index.html?v=2"));
        assert!(!manifest.matches("/about.html"));
    }

    #[test]
    fn test_root_entry_matches_only_root() {
        let manifest = Manifest::new(Vec::<String>::new());
        assert!(manifest.matches("/"));
        assert!(manifest.matches("http://localhost:8080/"));
        assert!(manifest.matches("http://localhost:8080"));
        assert!(!manifest.matches("/reports/today"));
    }

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("https://a.b/c/d?x=1"), "/c/d");
        assert_eq!(request_path("/c#frag"), "/c");
        assert_eq!(request_path("https://a.b"), "/");
    }

    #[test]
    fn test_manifest_serializes_as_array() {
        let manifest = Manifest::new(vec!["/index.html".to_string()]);
        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(json, r#"["/","/index.html"]"#);
    }
}
