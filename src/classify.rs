//! Project type detection
//!
//! The detected type is advisory: it is reported alongside the artifact but
//! never changes how a bundle is synthesized.

use crate::bundle::{file_name_of, AssetBundle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Framework hint derived from a bundle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    /// Next.js
    Next,
    /// React
    React,
    /// Vue
    Vue,
    /// Vite
    Vite,
    /// Plain static site
    #[default]
    Static,
}

impl ProjectType {
    /// Get the type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Next => "next",
            ProjectType::React => "react",
            ProjectType::Vue => "vue",
            ProjectType::Vite => "vite",
            ProjectType::Static => "static",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency markers, highest priority first
const DEPENDENCY_MARKERS: &[(&str, ProjectType)] = &[
    ("next", ProjectType::Next),
    ("react", ProjectType::React),
    ("vue", ProjectType::Vue),
];

/// Config file name fragments, highest priority first
const CONFIG_MARKERS: &[(&str, ProjectType)] = &[
    ("next.config", ProjectType::Next),
    ("vite.config", ProjectType::Vite),
    ("vue.config", ProjectType::Vue),
];

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

/// Classify a bundle
pub fn classify(bundle: &AssetBundle) -> ProjectType {
    if let Some(found) = classify_by_manifest(bundle) {
        return found;
    }

    for (fragment, project_type) in CONFIG_MARKERS {
        if bundle.paths().any(|p| file_name_of(p).contains(fragment)) {
            return *project_type;
        }
    }

    ProjectType::Static
}

fn classify_by_manifest(bundle: &AssetBundle) -> Option<ProjectType> {
    let (path, content) = bundle
        .assets()
        .iter()
        .filter(|(p, _)| file_name_of(p) == "package.json")
        .min_by_key(|(p, _)| p.matches('/').count())?;

    let manifest: PackageManifest = match serde_json::from_str(content) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::debug!(
                target: "singlefile_pack::classify",
                path = %path,
                "Ignoring unparseable package manifest: {}", e
            );
            return None;
        }
    };

    DEPENDENCY_MARKERS
        .iter()
        .find(|(name, _)| {
            manifest.dependencies.contains_key(*name)
                || manifest.dev_dependencies.contains_key(*name)
        })
        .map(|(_, project_type)| *project_type)
}
