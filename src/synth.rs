//! HTML synthesis: one self-contained document from an asset bundle
//!
//! The entry document is split into its head and body regions, every
//! stylesheet `<link>` and `<script src>` that resolves to a bundle entry is
//! replaced by an inline block, leftover styles and scripts are appended once,
//! and the result is wrapped in a fixed document skeleton and minified.
//!
//! Manipulation is textual (regex based) rather than tree based. Anything the
//! patterns do not recognize passes through unchanged.

use crate::bundle::{file_name_of, is_markup, is_script, is_style, AssetBundle};
use crate::config::{OnEmptyBundle, PackConfig};
use crate::optimize::Optimizer;
use crate::resolver::{is_external, Resolver};
use crate::{BundleError, BundleResult};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<head(?:\s[^>]*)?>(.*?)</head\s*>").expect("valid head regex")
});

static BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<body(?:\s[^>]*)?>(.*?)</body\s*>").expect("valid body regex")
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title(?:\s[^>]*)?>(.*?)</title\s*>").expect("valid title regex")
});

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid link regex"));

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("valid script regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("valid attribute regex")
});

/// Structural tags the skeleton already provides
static STRAY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!doctype[^>]*>|</?(?:html|head|body)(?:\s[^>]*)?>")
        .expect("valid stray tag regex")
});

/// Head elements the skeleton already provides
static HEAD_DUPLICATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<title(?:\s[^>]*)?>.*?</title\s*>|<meta\s[^>]*(?:charset|name\s*=\s*["']?viewport)[^>]*>"#,
    )
    .expect("valid head duplicate regex")
});

static SCRIPT_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</script").expect("valid script close regex"));

static STYLE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</style").expect("valid style close regex"));

/// The single HTML artifact produced from a bundle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesizedDocument {
    /// Final HTML
    pub html: String,
    /// Entry document path, `None` for the placeholder
    pub entry: Option<String>,
    /// Whether this is the placeholder document
    pub placeholder: bool,
    /// References replaced by inline blocks
    pub inlined: usize,
    /// Local references that matched nothing in the bundle
    pub unresolved: usize,
    /// External references left in place
    pub external: usize,
    /// Unreferenced styles/scripts appended at the end
    pub appended: usize,
}

impl SynthesizedDocument {
    /// Size of the document in bytes
    pub fn len(&self) -> usize {
        self.html.len()
    }

    /// Whether the document is empty
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// Take the HTML out of the document
    pub fn into_html(self) -> String {
        self.html
    }
}

/// Synthesize a bundle with default settings
pub fn synthesize(bundle: &AssetBundle) -> BundleResult<SynthesizedDocument> {
    Synthesizer::new().synthesize(bundle)
}

/// Choose the entry document of a bundle
///
/// The shallowest `index.html` wins (first in bundle order on ties), then the
/// first HTML file of any name.
pub fn select_entry(bundle: &AssetBundle) -> Option<&str> {
    bundle
        .paths()
        .filter(|p| file_name_of(p).eq_ignore_ascii_case("index.html"))
        .min_by_key(|p| p.matches('/').count())
        .or_else(|| bundle.paths().find(|p| is_markup(p)))
}

/// Reference counters gathered while inlining
#[derive(Debug, Default)]
struct InlineStats {
    inlined: usize,
    unresolved: usize,
    external: usize,
}

/// Synthesizer settings
#[derive(Debug, Clone)]
pub struct Synthesizer {
    on_empty: OnEmptyBundle,
    default_title: String,
    exclude_dirs: Vec<String>,
    optimize: bool,
    normalize_quotes: bool,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::from_config(&PackConfig::default())
    }
}

impl Synthesizer {
    /// Create a synthesizer with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a synthesizer for multi-file bundles from a configuration
    pub fn from_config(config: &PackConfig) -> Self {
        Self {
            on_empty: config.bundle.on_empty,
            default_title: config.bundle.default_title.clone(),
            exclude_dirs: config.bundle.exclude_dirs.clone(),
            optimize: config.optimize.enabled,
            normalize_quotes: config.optimize.quotes.applies(false),
        }
    }

    /// Set the empty bundle policy
    pub fn on_empty(mut self, policy: OnEmptyBundle) -> Self {
        self.on_empty = policy;
        self
    }

    /// Set the fallback title
    pub fn default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Enable or disable the minifier
    pub fn optimize(mut self, enabled: bool) -> Self {
        self.optimize = enabled;
        self
    }

    /// Enable or disable quote normalization
    pub fn normalize_quotes(mut self, enabled: bool) -> Self {
        self.normalize_quotes = enabled;
        self
    }

    /// Produce one document from a bundle
    pub fn synthesize(&self, bundle: &AssetBundle) -> BundleResult<SynthesizedDocument> {
        if bundle.is_empty() && self.on_empty == OnEmptyBundle::Fail {
            return Err(BundleError::EmptyBundle);
        }

        let Some(entry) = select_entry(bundle) else {
            info!(
                target: "singlefile_pack::synth",
                files = bundle.len(),
                "No HTML entry document, generating placeholder"
            );
            return Ok(SynthesizedDocument {
                html: placeholder_document(bundle, &self.default_title),
                placeholder: true,
                ..Default::default()
            });
        };

        let source = bundle.get(entry).unwrap_or_default();
        debug!(target: "singlefile_pack::synth", entry = %entry, "Selected entry document");

        let (head, body) = split_regions(source);
        let title = TITLE_RE
            .captures(&head)
            .or_else(|| TITLE_RE.captures(source))
            .map(|c| c[1].trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| escape_html(&self.default_title));

        let resolver = Resolver::new(bundle).with_entry(entry);
        let mut stats = InlineStats::default();

        let head = inline_references(&head, &resolver, bundle, &mut stats);
        let body = inline_references(&body, &resolver, bundle, &mut stats);

        let (extra_styles, extra_scripts, appended) =
            self.collect_unreferenced(bundle, &head, &body);

        let mut html = String::with_capacity(head.len() + body.len() + 512);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str(&format!("<title>{}</title>\n", title));
        let head = STRAY_TAG_RE.replace_all(&head, "");
        html.push_str(HEAD_DUPLICATE_RE.replace_all(&head, "").trim());
        html.push('\n');
        if !extra_styles.is_empty() {
            html.push_str(&format!("<style>\n{}</style>\n", extra_styles));
        }
        html.push_str("</head>\n<body>\n");
        html.push_str(STRAY_TAG_RE.replace_all(&body, "").trim());
        html.push('\n');
        if !extra_scripts.is_empty() {
            html.push_str(&format!("<script>\n{}</script>\n", extra_scripts));
        }
        html.push_str("</body>\n</html>\n");

        if self.optimize {
            html = Optimizer::new()
                .normalize_quotes(self.normalize_quotes)
                .optimize(&html);
        }

        info!(
            target: "singlefile_pack::synth",
            entry = %entry,
            inlined = stats.inlined,
            unresolved = stats.unresolved,
            external = stats.external,
            appended,
            bytes = html.len(),
            "Document synthesized"
        );

        Ok(SynthesizedDocument {
            html,
            entry: Some(entry.to_string()),
            placeholder: false,
            inlined: stats.inlined,
            unresolved: stats.unresolved,
            external: stats.external,
            appended,
        })
    }

    /// Styles and scripts not yet present in the document, as block bodies
    fn collect_unreferenced(
        &self,
        bundle: &AssetBundle,
        head: &str,
        body: &str,
    ) -> (String, String, usize) {
        let mut styles = String::new();
        let mut scripts = String::new();
        let mut appended = 0;

        for (path, content) in bundle.assets() {
            let style = is_style(path);
            if !style && !is_script(path) {
                continue;
            }
            if self.is_excluded(path) || content.trim().is_empty() {
                continue;
            }

            let present = |needle: &str| {
                head.contains(needle)
                    || body.contains(needle)
                    || styles.contains(needle)
                    || scripts.contains(needle)
            };

            if style {
                let escaped = escape_style(content);
                if present(content) || present(&escaped) {
                    continue;
                }
                styles.push_str(&format!("/* {} */\n{}\n", path, escaped));
            } else {
                let escaped = escape_script(content);
                if present(content) || present(&escaped) {
                    continue;
                }
                scripts.push_str(&format!("// {}\n{}\n", path, escaped));
            }

            debug!(target: "singlefile_pack::synth", path = %path, "Appending unreferenced asset");
            appended += 1;
        }

        (styles, scripts, appended)
    }

    fn is_excluded(&self, path: &str) -> bool {
        let mut segments: Vec<&str> = path.split('/').collect();
        segments.pop();
        segments
            .iter()
            .any(|segment| self.exclude_dirs.iter().any(|dir| dir == segment))
    }
}

/// Split a document into (head, body) region contents
///
/// A missing head yields an empty head; a missing body yields the whole
/// document minus its head region.
pub fn split_regions(source: &str) -> (String, String) {
    let head_match = HEAD_RE.captures(source);
    let head = head_match
        .as_ref()
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let body = match BODY_RE.captures(source) {
        Some(c) => c[1].to_string(),
        None => match head_match.as_ref().and_then(|c| c.get(0)) {
            Some(whole) => {
                let mut rest = source.to_string();
                rest.replace_range(whole.range(), "");
                rest
            }
            None => source.to_string(),
        },
    };

    (head, body)
}

/// Replace resolvable stylesheet links and script sources with inline blocks
fn inline_references(
    region: &str,
    resolver: &Resolver<'_>,
    bundle: &AssetBundle,
    stats: &mut InlineStats,
) -> String {
    let with_styles = LINK_RE.replace_all(region, |caps: &Captures| {
        let tag = &caps[0];
        if !is_stylesheet_link(tag) {
            return tag.to_string();
        }
        let Some(href) = attribute(tag, "href") else {
            return tag.to_string();
        };
        if is_external(&href) {
            stats.external += 1;
            return tag.to_string();
        }
        match resolver.resolve(&href) {
            Some(path) => {
                stats.inlined += 1;
                let media = attribute(tag, "media")
                    .map(|m| format!(" media=\"{}\"", m.replace('"', "&quot;")))
                    .unwrap_or_default();
                format!(
                    "<style{}>/* {} */{}</style>",
                    media,
                    path,
                    escape_style(bundle.get(path).unwrap_or_default())
                )
            }
            None => {
                stats.unresolved += 1;
                warn!(target: "singlefile_pack::synth", href = %href, "Unresolved stylesheet");
                tag.to_string()
            }
        }
    });

    let with_scripts = SCRIPT_RE.replace_all(&with_styles, |caps: &Captures| {
        let attrs = &caps[1];
        let Some(src) = attribute(attrs, "src") else {
            return caps[0].to_string();
        };
        if is_external(&src) {
            stats.external += 1;
            return caps[0].to_string();
        }
        match resolver.resolve(&src) {
            Some(path) => {
                stats.inlined += 1;
                let kind = attribute(attrs, "type")
                    .map(|t| format!(" type=\"{}\"", t.replace('"', "&quot;")))
                    .unwrap_or_default();
                format!(
                    "<script{}>// {}\n{}\n</script>",
                    kind,
                    path,
                    escape_script(bundle.get(path).unwrap_or_default())
                )
            }
            None => {
                stats.unresolved += 1;
                warn!(target: "singlefile_pack::synth", src = %src, "Unresolved script");
                caps[0].to_string()
            }
        }
    });

    with_scripts.into_owned()
}

/// Stylesheet `<link>` tags of a document as (byte range, href)
pub(crate) fn stylesheet_links(html: &str) -> Vec<(std::ops::Range<usize>, String)> {
    LINK_RE
        .find_iter(html)
        .filter(|m| is_stylesheet_link(m.as_str()))
        .filter_map(|m| attribute(m.as_str(), "href").map(|href| (m.range(), href)))
        .collect()
}

fn is_stylesheet_link(tag: &str) -> bool {
    attribute(tag, "rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

/// Value of a named attribute inside a tag or attribute list
pub(crate) fn attribute(tag: &str, name: &str) -> Option<String> {
    ATTR_RE.captures_iter(tag).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// Keep inlined script text from closing its `<script>` element early
fn escape_script(content: &str) -> String {
    SCRIPT_CLOSE_RE.replace_all(content, "<\\/script").into_owned()
}

/// Same for stylesheet text; `<\/style` is a valid CSS escape
pub(crate) fn escape_style(content: &str) -> String {
    STYLE_CLOSE_RE.replace_all(content, "<\\/style").into_owned()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Deterministic document listing the bundle's files
pub fn placeholder_document(bundle: &AssetBundle, title: &str) -> String {
    let title = escape_html(title);
    let mut html = String::from("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">",
    );
    html.push_str(&format!("<title>{}</title>", title));
    html.push_str(
        "<style>body{font-family:system-ui,sans-serif;margin:2rem;line-height:1.5}code{background:#f2f2f2;padding:0 .25rem}</style>",
    );
    html.push_str(&format!("</head><body><h1>{}</h1>", title));

    if bundle.is_empty() {
        html.push_str("<p>No files were bundled.</p>");
    } else {
        html.push_str(&format!(
            "<p>No HTML entry document was found. {} bundled file(s):</p><ul>",
            bundle.len()
        ));
        for path in bundle.paths() {
            html.push_str(&format!("<li><code>{}</code></li>", escape_html(path)));
        }
        html.push_str("</ul>");
    }

    html.push_str("</body></html>");
    html
}
