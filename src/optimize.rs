//! Textual minifier for synthesized documents
//!
//! Each pass applies, in order:
//!
//! 1. remove HTML comments
//! 2. remove `/* */` comments
//! 3. remove `//` line comments
//! 4. collapse whitespace runs to one space
//! 5. drop whitespace between tags
//!
//! Passes repeat until the output stops changing, so `optimize` is idempotent.
//! The repeat is capped at [`MAX_PASSES`]: comment markers nested so that each
//! removal exposes another comment need one pass per level, and only such input
//! can stop short of the fixpoint. Every step only deletes or shrinks text, so
//! the output is never longer than the input.
//!
//! Step 3 is token-unaware. It keeps a `//` preceded by `:`, a quote, `=`, `(`
//! or `\` (URL schemes, protocol-relative attribute values, `url(//...)`,
//! escaped slashes) and strips everything else, including `//` inside string
//! literals. That corruption is a known limitation of the artifact format.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static HTML_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid html comment regex"));

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"));

static LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(^|[^:"'=(\\])//[^\n]*"#).expect("valid line comment regex")
});

static WHITESPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"));

static INTER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid inter-tag regex"));

/// Upper bound on minify passes per document
pub const MAX_PASSES: usize = 16;

/// Minify with default settings (no quote normalization)
pub fn optimize(html: &str) -> String {
    Optimizer::new().optimize(html)
}

/// Configurable minifier
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimizer {
    /// Rewrite `"` to `'` after minification
    normalize_quotes: bool,
}

impl Optimizer {
    /// Create a minifier without quote normalization
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable quote normalization
    pub fn normalize_quotes(mut self, enabled: bool) -> Self {
        self.normalize_quotes = enabled;
        self
    }

    /// Minify a document
    pub fn optimize(&self, html: &str) -> String {
        let mut current = minify_pass(html);
        let mut passes = 1;
        loop {
            if passes == MAX_PASSES {
                tracing::debug!(
                    target: "singlefile_pack::optimize",
                    passes,
                    "Pass limit reached before a fixpoint"
                );
                break;
            }
            let next = minify_pass(&current);
            passes += 1;
            if next == current {
                break;
            }
            current = next;
        }

        if self.normalize_quotes {
            current = current.replace('"', "'");
        }

        tracing::debug!(
            target: "singlefile_pack::optimize",
            before = html.len(),
            after = current.len(),
            "Optimized document"
        );

        current
    }
}

fn minify_pass(html: &str) -> String {
    let text = HTML_COMMENT_RE.replace_all(html, "");
    let text = replace_owned(text, &BLOCK_COMMENT_RE, "");
    let text = replace_owned(text, &LINE_COMMENT_RE, "${1}");
    let text = replace_owned(text, &WHITESPACE_RUN_RE, " ");
    let text = replace_owned(text, &INTER_TAG_RE, "><");
    text.into_owned()
}

fn replace_owned<'a>(text: Cow<'a, str>, re: &Regex, rep: &str) -> Cow<'a, str> {
    let replaced = match re.replace_all(&text, rep) {
        Cow::Borrowed(_) => None,
        Cow::Owned(replaced) => Some(replaced),
    };
    match replaced {
        Some(replaced) => Cow::Owned(replaced),
        None => text,
    }
}
