//! Pack configuration types
//!
//! Runtime configuration for a deploy attempt. A [`PackConfig`] can be built in
//! code with the builder methods or loaded from a TOML manifest:
//!
//! ```toml
//! [bundle]
//! on_empty = "fail"            # "fail" | "placeholder"
//! default_title = "Permaweb App"
//! exclude_dirs = ["node_modules", ".git"]
//!
//! [optimize]
//! enabled = true
//! quotes = "single_file"       # "never" | "single_file" | "always"
//!
//! [network]
//! timeout_secs = 30
//! relays = ["", "https://corsproxy.io/?url={url}"]
//!
//! [deploy]
//! endpoint = "https://deploy.example.com/api/deploy"
//! max_size_kb = 3000
//! ```

use crate::{BundleError, BundleResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Default Value Functions
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_title() -> String {
    "Permaweb App".to_string()
}

fn default_exclude_dirs() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        ".git".to_string(),
        ".github".to_string(),
        ".next".to_string(),
        ".cache".to_string(),
    ]
}

fn default_max_entry_size() -> u64 {
    10 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("singlefile-pack/{}", crate::VERSION)
}

fn default_relays() -> Vec<String> {
    vec![String::new()]
}

fn default_max_size_kb() -> usize {
    3000
}

// ============================================================================
// Policies
// ============================================================================

/// What to do when a project yields no usable text assets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnEmptyBundle {
    /// Report [`BundleError::EmptyBundle`]
    #[default]
    Fail,
    /// Produce the placeholder document
    Placeholder,
}

/// When double quotes are rewritten to single quotes after minification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuotePolicy {
    /// Never rewrite quotes
    Never,
    /// Only for single HTML/MHTML uploads
    #[default]
    SingleFile,
    /// For every artifact
    Always,
}

impl QuotePolicy {
    /// Whether quotes are normalized for the given input kind
    pub fn applies(&self, single_file: bool) -> bool {
        match self {
            QuotePolicy::Never => false,
            QuotePolicy::SingleFile => single_file,
            QuotePolicy::Always => true,
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// `[bundle]` section: extraction and synthesis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleSection {
    /// Empty bundle policy
    #[serde(default)]
    pub on_empty: OnEmptyBundle,

    /// Title used when the entry document has no `<title>`
    #[serde(default = "default_title")]
    pub default_title: String,

    /// Directory names whose styles/scripts are never appended
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Archive entries larger than this are skipped
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size: u64,
}

impl Default for BundleSection {
    fn default() -> Self {
        Self {
            on_empty: OnEmptyBundle::default(),
            default_title: default_title(),
            exclude_dirs: default_exclude_dirs(),
            max_entry_size: default_max_entry_size(),
        }
    }
}

/// `[optimize]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptimizeSection {
    /// Run the minifier on synthesized documents
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quote normalization policy
    #[serde(default)]
    pub quotes: QuotePolicy,
}

impl Default for OptimizeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            quotes: QuotePolicy::default(),
        }
    }
}

/// `[network]` section: acquisition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// Timeout for plain fetches, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for render service calls, in seconds
    #[serde(default = "default_timeout_secs")]
    pub render_timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch relays tried in order; `""` means a direct request.
    /// A relay containing `{url}` receives the percent-encoded target,
    /// otherwise the target is appended as-is.
    #[serde(default = "default_relays")]
    pub relays: Vec<String>,

    /// Render service URL templates (must contain `{url}`)
    #[serde(default)]
    pub render_endpoints: Vec<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            render_timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            relays: default_relays(),
            render_endpoints: Vec::new(),
        }
    }
}

impl NetworkSection {
    /// Plain fetch timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Render service timeout
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

/// `[deploy]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploySection {
    /// Deploy endpoint for [`crate::HttpDeployer`]
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Artifact size ceiling in KiB
    #[serde(default = "default_max_size_kb")]
    pub max_size_kb: usize,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_size_kb: default_max_size_kb(),
        }
    }
}

impl DeploySection {
    /// Size ceiling in bytes
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_kb.saturating_mul(1024)
    }
}

// ============================================================================
// Pack Configuration
// ============================================================================

/// Complete configuration for a deploy attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackConfig {
    /// Extraction and synthesis settings
    #[serde(default)]
    pub bundle: BundleSection,

    /// Minifier settings
    #[serde(default)]
    pub optimize: OptimizeSection,

    /// Acquisition settings
    #[serde(default)]
    pub network: NetworkSection,

    /// Deploy settings
    #[serde(default)]
    pub deploy: DeploySection,
}

impl PackConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML manifest
    pub fn parse(content: &str) -> BundleResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML manifest from disk
    pub fn load(path: impl AsRef<Path>) -> BundleResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded pack config from {}", path.display());
        Self::parse(&content)
    }

    /// Set the empty bundle policy
    pub fn with_on_empty(mut self, policy: OnEmptyBundle) -> Self {
        self.bundle.on_empty = policy;
        self
    }

    /// Set the quote normalization policy
    pub fn with_quotes(mut self, policy: QuotePolicy) -> Self {
        self.optimize.quotes = policy;
        self
    }

    /// Enable or disable minification
    pub fn with_optimize(mut self, enabled: bool) -> Self {
        self.optimize.enabled = enabled;
        self
    }

    /// Set the default document title
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.bundle.default_title = title.into();
        self
    }

    /// Set the fetch relays
    pub fn with_relays(mut self, relays: Vec<String>) -> Self {
        self.network.relays = relays;
        self
    }

    /// Set the render service endpoints
    pub fn with_render_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.network.render_endpoints = endpoints;
        self
    }

    /// Set both network timeouts
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.network.timeout_secs = secs;
        self.network.render_timeout_secs = secs;
        self
    }

    /// Set the deploy endpoint
    pub fn with_deploy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.deploy.endpoint = Some(endpoint.into());
        self
    }

    /// Set the size ceiling in KiB
    pub fn with_max_size_kb(mut self, kb: usize) -> Self {
        self.deploy.max_size_kb = kb;
        self
    }

    /// Check the configuration for unusable values
    pub fn validate(&self) -> BundleResult<()> {
        if self.network.timeout_secs == 0 || self.network.render_timeout_secs == 0 {
            return Err(BundleError::Config(
                "Network timeouts must be greater than zero".to_string(),
            ));
        }

        if self.deploy.max_size_kb == 0 {
            return Err(BundleError::Config(
                "deploy.max_size_kb must be greater than zero".to_string(),
            ));
        }

        if self.network.relays.is_empty() {
            return Err(BundleError::Config(
                "network.relays must list at least one relay (use \"\" for direct)".to_string(),
            ));
        }

        for relay in self.network.relays.iter().filter(|r| !r.is_empty()) {
            let probe = relay.replace("{url}", "x");
            url::Url::parse(&probe)
                .map_err(|e| BundleError::Config(format!("Invalid relay {}: {}", relay, e)))?;
        }

        for endpoint in &self.network.render_endpoints {
            if !endpoint.contains("{url}") {
                return Err(BundleError::Config(format!(
                    "Render endpoint must contain {{url}}: {}",
                    endpoint
                )));
            }
            url::Url::parse(&endpoint.replace("{url}", "x")).map_err(|e| {
                BundleError::Config(format!("Invalid render endpoint {}: {}", endpoint, e))
            })?;
        }

        if let Some(endpoint) = &self.deploy.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| BundleError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_policy() {
        assert!(!QuotePolicy::Never.applies(true));
        assert!(QuotePolicy::SingleFile.applies(true));
        assert!(!QuotePolicy::SingleFile.applies(false));
        assert!(QuotePolicy::Always.applies(false));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(PackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_max_size_bytes() {
        let config = PackConfig::new().with_max_size_kb(2);
        assert_eq!(config.deploy.max_size_bytes(), 2048);
    }
}
