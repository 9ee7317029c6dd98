//! Asset bundle: the in-memory path -> text mapping synthesis works on

use crate::{BundleError, BundleResult};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Markup suffixes
pub const MARKUP_EXTENSIONS: &[&str] = &["html", "htm", "xhtml"];

/// Stylesheet suffixes that can be inlined
pub const STYLE_EXTENSIONS: &[&str] = &["css"];

/// Script suffixes that can be inlined
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// Every suffix admitted into a bundle
pub const TEXT_EXTENSIONS: &[&str] = &[
    // markup
    "html", "htm", "xhtml", "svg",
    // styles
    "css", "scss", "sass", "less",
    // scripts
    "js", "mjs", "cjs", "jsx", "ts", "tsx",
    // data and manifests
    "json", "xml", "txt", "md", "yml", "yaml", "toml", "webmanifest",
    // component and template sources
    "vue", "svelte", "astro", "hbs", "ejs",
];

/// Lowercased extension of a slash-separated path
pub fn extension_of(path: &str) -> Option<String> {
    let name = file_name_of(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() && !name[1..].contains('.') {
        // dotfiles such as `.gitignore` have no extension
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Last segment of a slash-separated path
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn has_extension(path: &str, allowed: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| allowed.contains(&ext.as_str()))
}

/// Whether a path belongs in a bundle
pub fn is_text_asset(path: &str) -> bool {
    has_extension(path, TEXT_EXTENSIONS)
}

/// Whether a path is an HTML document
pub fn is_markup(path: &str) -> bool {
    has_extension(path, MARKUP_EXTENSIONS)
}

/// Whether a path is an inlinable stylesheet
pub fn is_style(path: &str) -> bool {
    has_extension(path, STYLE_EXTENSIONS)
}

/// Whether a path is an inlinable script
pub fn is_script(path: &str) -> bool {
    has_extension(path, SCRIPT_EXTENSIONS)
}

/// An entry left out of a bundle during extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Archive path of the entry
    pub path: String,
    /// Why it was skipped
    pub reason: String,
}

/// Ordered collection of text assets keyed by slash-separated path
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    /// Assets as (relative_path, content) pairs
    assets: Vec<(String, String)>,
    /// Entries dropped during extraction
    skipped: Vec<SkippedEntry>,
    /// Total content size in bytes
    total_size: u64,
}

impl AssetBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset; an existing path has its content replaced in place
    pub fn add(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        self.total_size += content.len() as u64;

        if let Some(slot) = self.assets.iter_mut().find(|(p, _)| *p == path) {
            self.total_size -= slot.1.len() as u64;
            slot.1 = content;
        } else {
            self.assets.push((path, content));
        }
    }

    /// Record an entry that was left out
    pub fn skip(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedEntry {
            path: path.into(),
            reason: reason.into(),
        });
    }

    /// Look up an asset by exact path
    pub fn get(&self, path: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, c)| c.as_str())
    }

    /// Whether an exact path is present
    pub fn contains(&self, path: &str) -> bool {
        self.assets.iter().any(|(p, _)| p == path)
    }

    /// Get all assets
    pub fn assets(&self) -> &[(String, String)] {
        &self.assets
    }

    /// Iterate over asset paths in bundle order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|(p, _)| p.as_str())
    }

    /// Entries dropped during extraction
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// Get the number of assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Check if the bundle is empty
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Get total content size
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Convert to owned assets vector
    pub fn into_assets(self) -> Vec<(String, String)> {
        self.assets
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for AssetBundle {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut bundle = AssetBundle::new();
        for (path, content) in iter {
            bundle.add(path, content);
        }
        bundle
    }
}

/// Builder for creating asset bundles from a project directory
pub struct BundleBuilder {
    /// Root directory for assets
    root: std::path::PathBuf,
    /// Patterns to exclude
    exclude_patterns: Vec<String>,
}

impl BundleBuilder {
    /// Create a new bundle builder for a directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclude_patterns: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                ".DS_Store".to_string(),
                "*.map".to_string(),
            ],
        }
    }

    /// Add patterns to exclude
    pub fn exclude(mut self, patterns: &[&str]) -> Self {
        self.exclude_patterns
            .extend(patterns.iter().map(|s| s.to_string()));
        self
    }

    /// Build the asset bundle; files that are not UTF-8 text are skipped
    pub fn build(&self) -> BundleResult<AssetBundle> {
        if !self.root.exists() {
            return Err(BundleError::InvalidInput(format!(
                "Project path not found: {}",
                self.root.display()
            )));
        }

        let mut bundle = AssetBundle::new();

        // A single file is bundled under its own name
        if self.root.is_file() {
            let name = self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "index.html".to_string());
            let content = fs::read_to_string(&self.root)?;
            bundle.add(name, content);
            return Ok(bundle);
        }

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.should_exclude(e))
        {
            let entry = entry.map_err(|e| BundleError::Io(e.into()))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path
                .strip_prefix(&self.root)
                .map_err(|e| BundleError::InvalidInput(e.to_string()))?;

            // Normalize path separators to forward slashes
            let relative_str = relative.to_string_lossy().replace('\\', "/");

            if !is_text_asset(&relative_str) {
                continue;
            }

            match fs::read(path).map(String::from_utf8) {
                Ok(Ok(content)) => {
                    tracing::debug!("Adding asset: {} ({} bytes)", relative_str, content.len());
                    bundle.add(relative_str, content);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Skipping non-UTF-8 file {}: {}", relative_str, e);
                    bundle.skip(relative_str, e.to_string());
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {}: {}", relative_str, e);
                    bundle.skip(relative_str, e.to_string());
                }
            }
        }

        tracing::info!(
            "Bundle created: {} files, {} bytes total",
            bundle.len(),
            bundle.total_size()
        );

        Ok(bundle)
    }

    /// Check if an entry should be excluded
    fn should_exclude(&self, entry: &walkdir::DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        for pattern in &self.exclude_patterns {
            if let Some(suffix) = pattern.strip_prefix('*') {
                // Wildcard pattern (e.g., "*.map")
                if name.ends_with(suffix) {
                    return true;
                }
            } else if name == pattern.as_str() {
                return true;
            }
        }

        false
    }
}
