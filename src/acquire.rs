//! Remote content acquisition
//!
//! Every network step is an ordered [`FallbackChain`]: each attempt runs at
//! most once, the first success wins and the remaining attempts are never
//! started. When all attempts fail the chain reports every failure reason.
//!
//! Transport is behind the [`Fetch`] capability so chains can be exercised
//! without a network; [`HttpFetcher`] is the ureq-backed implementation.

use crate::archive::ArchiveFormat;
use crate::config::NetworkSection;
use crate::resolver::is_external;
use crate::synth::{escape_style, stylesheet_links};
use crate::{BundleError, BundleResult};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound on a single response body
const MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

// ============================================================================
// Transport
// ============================================================================

/// Fetches the body of a URL
pub trait Fetch: Send + Sync {
    /// GET `url`; non-success statuses are errors
    fn fetch(&self, url: &str, timeout: Duration) -> BundleResult<Vec<u8>>;
}

/// HTTP transport backed by ureq
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with a user agent
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    /// Create a fetcher from the `[network]` configuration
    pub fn from_config(config: &NetworkSection) -> Self {
        Self::new(config.user_agent.clone())
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> BundleResult<Vec<u8>> {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&self.user_agent)
            .build();

        let response = agent
            .get(url)
            .call()
            .map_err(|e| BundleError::Fetch(format!("{}: {}", url, e)))?;

        let mut buffer = Vec::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut buffer)
            .map_err(|e| BundleError::Fetch(format!("Failed to read response from {}: {}", url, e)))?;

        debug!(target: "singlefile_pack::acquire", url = %url, bytes = buffer.len(), "Fetched");
        Ok(buffer)
    }
}

/// Route a target URL through a relay
///
/// An empty relay is a direct request. A relay containing `{url}` receives the
/// percent-encoded target; any other relay is used as a prefix.
pub fn relay_url(relay: &str, target: &str) -> String {
    if relay.is_empty() {
        target.to_string()
    } else if relay.contains("{url}") {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        relay.replace("{url}", &encoded)
    } else {
        format!("{}{}", relay, target)
    }
}

fn relay_label(relay: &str) -> &str {
    if relay.is_empty() {
        "direct"
    } else {
        relay
    }
}

// ============================================================================
// Fallback chains
// ============================================================================

type AttemptFn<'a, T> = Box<dyn FnOnce() -> BundleResult<T> + 'a>;

/// Ordered list of alternative ways to obtain one value
pub struct FallbackChain<'a, T> {
    target: String,
    attempts: Vec<(String, AttemptFn<'a, T>)>,
}

impl<'a, T> FallbackChain<'a, T> {
    /// Create an empty chain for a named target
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attempts: Vec::new(),
        }
    }

    /// Append an attempt
    pub fn attempt(
        mut self,
        label: impl Into<String>,
        run: impl FnOnce() -> BundleResult<T> + 'a,
    ) -> Self {
        self.attempts.push((label.into(), Box::new(run)));
        self
    }

    /// Append an attempt in place
    pub fn push(&mut self, label: impl Into<String>, run: impl FnOnce() -> BundleResult<T> + 'a) {
        self.attempts.push((label.into(), Box::new(run)));
    }

    /// Number of attempts
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Whether the chain has no attempts
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Run attempts in order until one succeeds
    ///
    /// Returns the label of the winning attempt with its value.
    pub fn run(self) -> BundleResult<(String, T)> {
        let mut failures = Vec::new();

        for (label, run) in self.attempts {
            debug!(target: "singlefile_pack::acquire", target_name = %self.target, attempt = %label, "Trying");
            match run() {
                Ok(value) => {
                    info!(
                        target: "singlefile_pack::acquire",
                        target_name = %self.target,
                        attempt = %label,
                        failed_before = failures.len(),
                        "Acquired"
                    );
                    return Ok((label, value));
                }
                Err(e) => {
                    warn!(
                        target: "singlefile_pack::acquire",
                        target_name = %self.target,
                        attempt = %label,
                        "Attempt failed: {}", e
                    );
                    failures.push(format!("{}: {}", label, e));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no acquisition attempts configured".to_string());
        }

        Err(BundleError::Acquisition {
            target: self.target,
            failures,
        })
    }
}

// ============================================================================
// GitHub repositories
// ============================================================================

/// An `owner/repo` identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    /// Account or organization
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl GitHubRepo {
    /// Parse `owner/repo` or a github.com URL
    pub fn parse(input: &str) -> BundleResult<Self> {
        let invalid = || BundleError::InvalidRepository(input.to_string());
        let trimmed = input.trim();

        let path = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let parsed = Url::parse(trimmed).map_err(|_| invalid())?;
            match parsed.host_str() {
                Some("github.com") | Some("www.github.com") => parsed.path().to_string(),
                _ => return Err(invalid()),
            }
        } else if let Some(rest) = trimmed.strip_prefix("git@github.com:") {
            rest.to_string()
        } else if let Some(rest) = trimmed.strip_prefix("github.com/") {
            rest.to_string()
        } else {
            trimmed.to_string()
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next().ok_or_else(invalid)?;
        let repo = segments.next().ok_or_else(invalid)?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        // bare identifiers must be exactly two segments
        let is_url = path != trimmed;
        if !is_url && segments.next().is_some() {
            return Err(invalid());
        }

        let owner_ok = !owner.is_empty()
            && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        let repo_ok = !repo.is_empty()
            && repo != "."
            && repo != ".."
            && repo
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if !owner_ok || !repo_ok {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Archive URLs in preference order: default branch, `main`, `master`
    pub fn archive_urls(&self) -> Vec<String> {
        vec![
            format!(
                "https://api.github.com/repos/{}/{}/zipball",
                self.owner, self.repo
            ),
            format!(
                "https://github.com/{}/{}/archive/refs/heads/main.zip",
                self.owner, self.repo
            ),
            format!(
                "https://github.com/{}/{}/archive/refs/heads/master.zip",
                self.owner, self.repo
            ),
        ]
    }
}

impl std::fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Downloads repository archives through the configured relays
pub struct GitHubSource {
    fetcher: Arc<dyn Fetch>,
    relays: Vec<String>,
    timeout: Duration,
}

impl GitHubSource {
    /// Create a source from the `[network]` configuration
    pub fn new(fetcher: Arc<dyn Fetch>, config: &NetworkSection) -> Self {
        Self {
            fetcher,
            relays: config.relays.clone(),
            timeout: config.timeout(),
        }
    }

    /// Archive bytes for a repository
    pub fn download(&self, repo: &GitHubRepo) -> BundleResult<Vec<u8>> {
        let mut chain = FallbackChain::new(repo.to_string());

        for archive_url in repo.archive_urls() {
            for relay in &self.relays {
                let fetcher = Arc::clone(&self.fetcher);
                let request = relay_url(relay, &archive_url);
                let timeout = self.timeout;
                chain.push(
                    format!("{} via {}", archive_url, relay_label(relay)),
                    move || {
                        let bytes = fetcher.fetch(&request, timeout)?;
                        if ArchiveFormat::detect(&bytes).is_none() {
                            return Err(BundleError::Fetch(format!(
                                "{} returned {} bytes that are not an archive",
                                request,
                                bytes.len()
                            )));
                        }
                        Ok(bytes)
                    },
                );
            }
        }

        chain.run().map(|(_, bytes)| bytes)
    }
}

// ============================================================================
// Remote pages
// ============================================================================

/// Turns a page URL into fully rendered HTML
pub trait RenderService: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Render the page at `url`
    fn render(&self, url: &str, timeout: Duration) -> BundleResult<String>;
}

/// Render service reached over HTTP through a URL template
pub struct HttpRenderService {
    template: String,
    fetcher: Arc<dyn Fetch>,
}

impl HttpRenderService {
    /// Create a service from a template containing `{url}`
    pub fn new(template: impl Into<String>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            template: template.into(),
            fetcher,
        }
    }
}

impl RenderService for HttpRenderService {
    fn name(&self) -> &str {
        &self.template
    }

    fn render(&self, url: &str, timeout: Duration) -> BundleResult<String> {
        let bytes = self.fetcher.fetch(&relay_url(&self.template, url), timeout)?;
        String::from_utf8(bytes)
            .map_err(|e| BundleError::Fetch(format!("Rendered page is not UTF-8: {}", e)))
    }
}

/// Markup acquired for a remote page
#[derive(Debug, Clone)]
pub struct AcquiredPage {
    /// Normalized page URL
    pub url: Url,
    /// Page markup
    pub html: String,
    /// Whether a render service produced the markup
    pub rendered: bool,
    /// Stylesheets fetched and inlined after a raw fetch
    pub stylesheets_inlined: usize,
}

/// Acquires a live page: render services first, then a raw fetch
pub struct PageSource {
    fetcher: Arc<dyn Fetch>,
    renderers: Vec<Arc<dyn RenderService>>,
    relays: Vec<String>,
    timeout: Duration,
    render_timeout: Duration,
}

impl PageSource {
    /// Create a source with one HTTP render service per configured endpoint
    pub fn new(fetcher: Arc<dyn Fetch>, config: &NetworkSection) -> Self {
        let renderers = config
            .render_endpoints
            .iter()
            .map(|template| {
                Arc::new(HttpRenderService::new(template.clone(), Arc::clone(&fetcher)))
                    as Arc<dyn RenderService>
            })
            .collect();

        Self {
            fetcher,
            renderers,
            relays: config.relays.clone(),
            timeout: config.timeout(),
            render_timeout: config.render_timeout(),
        }
    }

    /// Replace the render services
    pub fn with_renderers(mut self, renderers: Vec<Arc<dyn RenderService>>) -> Self {
        self.renderers = renderers;
        self
    }

    /// Acquire the markup of a page
    pub fn acquire(&self, url: &str) -> BundleResult<AcquiredPage> {
        let page_url = normalize_page_url(url)?;
        let target = page_url.to_string();

        let mut chain: FallbackChain<'_, (String, bool)> = FallbackChain::new(target.clone());
        for renderer in &self.renderers {
            let target = target.clone();
            chain.push(format!("render via {}", renderer.name()), move || {
                let html = renderer.render(&target, self.render_timeout)?;
                non_empty_markup(html, &target).map(|html| (html, true))
            });
        }
        for relay in &self.relays {
            let request = relay_url(relay, &target);
            let target = target.clone();
            chain.push(format!("fetch via {}", relay_label(relay)), move || {
                let bytes = self.fetcher.fetch(&request, self.timeout)?;
                let html = String::from_utf8_lossy(&bytes).into_owned();
                non_empty_markup(html, &target).map(|html| (html, false))
            });
        }

        let (_, (html, rendered)) = chain.run()?;

        if rendered {
            return Ok(AcquiredPage {
                url: page_url,
                html,
                rendered,
                stylesheets_inlined: 0,
            });
        }

        let (html, stylesheets_inlined) = self.inline_stylesheets(&page_url, &html);
        Ok(AcquiredPage {
            url: page_url,
            html,
            rendered,
            stylesheets_inlined,
        })
    }

    /// Fetch same-origin stylesheets of a raw page into one `<style>` block
    ///
    /// Links whose stylesheet was fetched are removed; failures leave the link
    /// in place.
    pub fn inline_stylesheets(&self, page_url: &Url, html: &str) -> (String, usize) {
        let mut css = String::new();
        let mut inlined_ranges = Vec::new();

        for (range, href) in stylesheet_links(html) {
            if is_external(&href) {
                continue;
            }
            let absolute = match page_url.join(&href) {
                Ok(absolute) if absolute.origin() == page_url.origin() => absolute,
                Ok(absolute) => {
                    debug!(target: "singlefile_pack::acquire", href = %absolute, "Skipping cross-origin stylesheet");
                    continue;
                }
                Err(e) => {
                    warn!(target: "singlefile_pack::acquire", href = %href, "Unusable stylesheet href: {}", e);
                    continue;
                }
            };

            let mut chain = FallbackChain::new(absolute.to_string());
            for relay in &self.relays {
                let request = relay_url(relay, absolute.as_str());
                chain.push(format!("stylesheet via {}", relay_label(relay)), move || {
                    let bytes = self.fetcher.fetch(&request, self.timeout)?;
                    String::from_utf8(bytes)
                        .map_err(|e| BundleError::Fetch(format!("Stylesheet is not UTF-8: {}", e)))
                });
            }

            match chain.run() {
                Ok((_, text)) => {
                    css.push_str(&format!("/* {} */\n{}\n", absolute, text));
                    inlined_ranges.push(range);
                }
                Err(e) => warn!(target: "singlefile_pack::acquire", href = %absolute, "Stylesheet skipped: {}", e),
            }
        }

        if inlined_ranges.is_empty() {
            return (html.to_string(), 0);
        }

        let mut out = html.to_string();
        for range in inlined_ranges.iter().rev() {
            out.replace_range(range.clone(), "");
        }

        let block = format!("<style>\n{}</style>", escape_style(&css));
        match out.to_ascii_lowercase().find("</head") {
            Some(pos) => out.insert_str(pos, &block),
            None => out.insert_str(0, &block),
        }

        (out, inlined_ranges.len())
    }
}

/// Add `https://` when the scheme is missing and require http(s)
pub fn normalize_page_url(url: &str) -> BundleResult<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(BundleError::InvalidUrl("empty URL".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed =
        Url::parse(&candidate).map_err(|e| BundleError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(BundleError::InvalidUrl(format!(
            "{}: unsupported scheme {}",
            url, other
        ))),
    }
}

fn non_empty_markup(html: String, target: &str) -> BundleResult<String> {
    if html.trim().is_empty() {
        Err(BundleError::Fetch(format!("{} returned an empty page", target)))
    } else {
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_url() {
        assert_eq!(relay_url("", "https://a.com/x"), "https://a.com/x");
        assert_eq!(
            relay_url("https://proxy.example/?url={url}", "https://a.com/x?y=1"),
            "https://proxy.example/?url=https%3A%2F%2Fa.com%2Fx%3Fy%3D1"
        );
        assert_eq!(
            relay_url("https://proxy.example/", "https://a.com/x"),
            "https://proxy.example/https://a.com/x"
        );
    }

    #[test]
    fn test_parse_repo_forms() {
        let expected = GitHubRepo {
            owner: "octo".to_string(),
            repo: "site.io".to_string(),
        };
        assert_eq!(GitHubRepo::parse("octo/site.io").unwrap(), expected);
        assert_eq!(GitHubRepo::parse(" octo/site.io.git ").unwrap(), expected);
        assert_eq!(
            GitHubRepo::parse("https://github.com/octo/site.io/tree/main").unwrap(),
            expected
        );
        assert_eq!(GitHubRepo::parse("git@github.com:octo/site.io.git").unwrap(), expected);
        assert_eq!(GitHubRepo::parse("github.com/octo/site.io").unwrap(), expected);
    }

    #[test]
    fn test_parse_repo_rejects() {
        for bad in ["", "octo", "octo/", "a/b/c", "oc to/x", "o/..", "https://gitlab.com/a/b"] {
            assert!(
                matches!(GitHubRepo::parse(bad), Err(BundleError::InvalidRepository(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_archive_urls_order() {
        let repo = GitHubRepo::parse("octo/site").unwrap();
        let urls = repo.archive_urls();
        assert!(urls[0].ends_with("/repos/octo/site/zipball"));
        assert!(urls[1].ends_with("/heads/main.zip"));
        assert!(urls[2].ends_with("/heads/master.zip"));
    }

    #[test]
    fn test_normalize_page_url() {
        assert_eq!(
            normalize_page_url("example.com/page").unwrap().as_str(),
            "https://example.com/page"
        );
        assert!(normalize_page_url("ftp://example.com").is_err());
        assert!(normalize_page_url("  ").is_err());
    }

    #[test]
    fn test_chain_short_circuits() {
        let mut calls = Vec::new();
        let result = {
            let calls = std::cell::RefCell::new(&mut calls);
            FallbackChain::new("thing")
                .attempt("one", || {
                    calls.borrow_mut().push(1);
                    Err(BundleError::Fetch("down".to_string()))
                })
                .attempt("two", || {
                    calls.borrow_mut().push(2);
                    Ok(42)
                })
                .attempt("three", || {
                    calls.borrow_mut().push(3);
                    Ok(7)
                })
                .run()
        };
        assert_eq!(result.unwrap(), ("two".to_string(), 42));
        assert_eq!(calls, vec![1, 2]);
    }

    #[test]
    fn test_chain_exhausted() {
        let result: BundleResult<(String, ())> = FallbackChain::new("thing")
            .attempt("a", || Err(BundleError::Fetch("x".to_string())))
            .attempt("b", || Err(BundleError::Fetch("y".to_string())))
            .run();
        match result {
            Err(BundleError::Acquisition { target, failures }) => {
                assert_eq!(target, "thing");
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("a:"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
