//! Reference resolution: maps an `href`/`src` value to a bundle entry
//!
//! Matching is deliberately permissive and ordered from strict to loose. The
//! first rule that produces a match wins:
//!
//! 0. the reference joined onto the entry document's directory, exact key
//! 1. exact match against every key with its first path segment removed
//!    (archives usually wrap the project in one root directory)
//! 2. a key ending with the reference
//! 3. a key containing the reference without a leading `./`
//! 4. a key containing the reference with every `/` removed
//!
//! Later rules can mis-resolve short ambiguous paths, so the order matters.

use crate::bundle::AssetBundle;

/// Prefixes of references that are never looked up in the bundle
const EXTERNAL_PREFIXES: &[&str] = &["http://", "https://", "//", "data:"];

/// Whether a reference points outside the bundle
pub fn is_external(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    EXTERNAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Resolve a reference against a bundle with no entry directory
pub fn resolve<'a>(reference: &str, bundle: &'a AssetBundle) -> Option<&'a str> {
    Resolver::new(bundle).resolve(reference)
}

/// Resolves references for one entry document
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    bundle: &'a AssetBundle,
    /// Directory of the entry document, `""` for the bundle root
    base_dir: Option<String>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a bundle
    pub fn new(bundle: &'a AssetBundle) -> Self {
        Self {
            bundle,
            base_dir: None,
        }
    }

    /// Resolve relative references from the directory of `entry_path` first
    pub fn with_entry(mut self, entry_path: &str) -> Self {
        let dir = entry_path
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        self.base_dir = Some(dir);
        self
    }

    /// Resolve a reference to a bundle key
    pub fn resolve(&self, reference: &str) -> Option<&'a str> {
        if is_external(reference) {
            return None;
        }

        // "", "/", "./" and friends name no file and would match any key
        let reference = strip_query(reference.trim());
        if reference.chars().all(|c| c == '/' || c == '.') {
            return None;
        }

        let found = self
            .relative_to_entry(reference)
            .or_else(|| self.strip_root_match(reference))
            .or_else(|| self.find_key(|key| key.ends_with(reference)))
            .or_else(|| {
                let needle = reference.strip_prefix("./").unwrap_or(reference);
                self.find_key(|key| !needle.is_empty() && key.contains(needle))
            })
            .or_else(|| {
                let needle = reference.replace('/', "");
                self.find_key(|key| !needle.is_empty() && key.contains(needle.as_str()))
            });

        match found {
            Some(key) => tracing::trace!(
                target: "singlefile_pack::resolver",
                reference = %reference,
                key = %key,
                "Resolved reference"
            ),
            None => tracing::debug!(
                target: "singlefile_pack::resolver",
                reference = %reference,
                "Reference not found in bundle"
            ),
        }

        found
    }

    fn find_key(&self, predicate: impl Fn(&str) -> bool) -> Option<&'a str> {
        self.bundle.paths().find(|key| predicate(*key))
    }

    /// Rule 0: the reference as a path relative to the entry document
    fn relative_to_entry(&self, reference: &str) -> Option<&'a str> {
        let base = self.base_dir.as_deref()?;
        if reference.starts_with('/') {
            return None;
        }
        let joined = if base.is_empty() {
            reference.to_string()
        } else {
            format!("{}/{}", base, reference)
        };
        let normalized = normalize(&joined)?;
        self.find_key(|key| key == normalized)
    }

    /// Rule 1: compare against keys with their first segment removed
    fn strip_root_match(&self, reference: &str) -> Option<&'a str> {
        let mut needle = reference;
        loop {
            if let Some(rest) = needle.strip_prefix("./") {
                needle = rest;
            } else if let Some(rest) = needle.strip_prefix('/') {
                needle = rest;
            } else {
                break;
            }
        }
        if needle.is_empty() {
            return None;
        }
        self.find_key(|key| {
            key.split_once('/')
                .is_some_and(|(_, rest)| rest == needle)
        })
    }
}

fn strip_query(reference: &str) -> &str {
    match reference.find(['?', '#']) {
        Some(pos) => &reference[..pos],
        None => reference,
    }
}

/// Collapse `.` and `..` segments; `None` if the path climbs above the root
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
