//! Pack orchestration: one deploy attempt from input to artifact
//!
//! ```text
//! PackSource ──acquire──> archive bytes / markup / directory
//!            ──extract──> AssetBundle
//!            ──classify─> ProjectType
//!            ──synthesize + optimize──> HTML
//!            ──size check + deploy──> links
//! ```

use crate::acquire::{Fetch, GitHubRepo, GitHubSource, HttpFetcher, PageSource, RenderService};
use crate::archive::ArchiveReader;
use crate::bundle::{AssetBundle, BundleBuilder, SkippedEntry};
use crate::classify::{classify, ProjectType};
use crate::deploy::{check_size, content_hash, Deployer, HttpDeployer};
use crate::metrics::PackMetrics;
use crate::optimize::Optimizer;
use crate::progress::{PackProgress, ProgressExt};
use crate::single_file::html_from_single_file;
use crate::synth::Synthesizer;
use crate::{BundleError, BundleResult, PackConfig};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Where the project comes from
#[derive(Debug, Clone)]
pub enum PackSource {
    /// Uploaded archive bytes (zip, tar or tar.gz)
    Archive(Vec<u8>),
    /// GitHub repository identifier or URL
    GitHub(String),
    /// Live page URL
    Url(String),
    /// Uploaded HTML or MHTML file
    SingleFile {
        /// File name, used to tell HTML from MHTML
        name: String,
        /// File content
        content: String,
    },
    /// Project directory on disk
    Directory(PathBuf),
}

impl PackSource {
    /// Short label of the source kind
    pub fn kind(&self) -> &'static str {
        match self {
            PackSource::Archive(_) => "archive",
            PackSource::GitHub(_) => "github",
            PackSource::Url(_) => "url",
            PackSource::SingleFile { .. } => "single-file",
            PackSource::Directory(_) => "directory",
        }
    }
}

impl fmt::Display for PackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackSource::Archive(bytes) => write!(f, "archive ({} bytes)", bytes.len()),
            PackSource::GitHub(repo) => write!(f, "github {}", repo),
            PackSource::Url(url) => write!(f, "url {}", url),
            PackSource::SingleFile { name, .. } => write!(f, "file {}", name),
            PackSource::Directory(path) => write!(f, "directory {}", path.display()),
        }
    }
}

/// Result of a pack operation
#[derive(Debug, Clone)]
pub struct PackOutput {
    /// Final document
    pub html: String,
    /// Document size in bytes
    pub size: usize,
    /// Short BLAKE3 hash of the document
    pub content_hash: String,
    /// Source kind label
    pub source: &'static str,
    /// Detected framework
    pub project_type: ProjectType,
    /// Number of text assets in the bundle
    pub asset_count: usize,
    /// Entries left out during extraction
    pub skipped: Vec<SkippedEntry>,
    /// Entry document, `None` for the placeholder
    pub entry: Option<String>,
    /// Whether the placeholder document was produced
    pub placeholder: bool,
    /// References replaced by inline blocks
    pub inlined: usize,
    /// Local references that matched nothing
    pub unresolved: usize,
    /// Unreferenced styles/scripts appended
    pub appended: usize,
    /// Links returned by the deployer, empty until deployed
    pub links: Vec<String>,
    /// Phase timings
    pub metrics: PackMetrics,
}

/// Raw material produced by the acquire phase
enum Acquired {
    /// Archive bytes still to be unpacked
    Archive(Vec<u8>),
    /// Local directory still to be walked
    Directory(PathBuf),
    /// Page markup fetched for a URL source
    Page(String),
    /// Uploaded document still to be decoded
    Upload { name: String, content: String },
}

/// What the extract phase hands to synthesis
enum Extracted {
    Bundle(AssetBundle),
    /// Single uploaded document that skips synthesis
    Document { name: String, html: String },
}

/// Main packer
pub struct Packer {
    config: PackConfig,
    fetcher: Arc<dyn Fetch>,
    renderers: Option<Vec<Arc<dyn RenderService>>>,
    progress: bool,
}

impl Packer {
    /// Create a packer with the ureq transport
    pub fn new(config: PackConfig) -> Self {
        let fetcher = Arc::new(HttpFetcher::from_config(&config.network));
        Self {
            config,
            fetcher,
            renderers: None,
            progress: false,
        }
    }

    /// Replace the network transport
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the render services built from `network.render_endpoints`
    pub fn with_renderers(mut self, renderers: Vec<Arc<dyn RenderService>>) -> Self {
        self.renderers = Some(renderers);
        self
    }

    /// Draw progress indicators on stderr
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Turn a source into one optimized HTML document
    pub fn pack(&self, source: PackSource) -> BundleResult<PackOutput> {
        self.config.validate()?;

        let progress = if self.progress {
            PackProgress::new()
        } else {
            PackProgress::hidden()
        };
        let mut metrics = PackMetrics::new();
        let kind = source.kind();

        info!(target: "singlefile_pack::packer", source = %source, "Packing");

        let acquired = self.step(&progress, "Acquiring project", || self.acquire(source))?;
        metrics.mark_acquire();

        let extracted = self.step(&progress, "Extracting files", || self.extract(acquired))?;
        metrics.mark_extract();

        let mut output = match extracted {
            Extracted::Document { name, html } => {
                metrics.mark_classify();
                let html = self.step(&progress, "Optimizing document", || {
                    Ok(self.optimize_single_file(&html))
                })?;
                metrics.mark_synthesize();

                PackOutput {
                    size: html.len(),
                    content_hash: content_hash(&html),
                    html,
                    source: kind,
                    project_type: ProjectType::Static,
                    asset_count: 1,
                    skipped: Vec::new(),
                    entry: Some(name),
                    placeholder: false,
                    inlined: 0,
                    unresolved: 0,
                    appended: 0,
                    links: Vec::new(),
                    metrics,
                }
            }
            Extracted::Bundle(bundle) => {
                if !bundle.skipped().is_empty() {
                    progress.warn(&format!("{} entries skipped", bundle.skipped().len()));
                }

                let project_type = metrics.time_phase("classify", || classify(&bundle));
                metrics.mark_classify();
                debug!(target: "singlefile_pack::packer", project_type = %project_type, "Classified project");

                let synthesizer = Synthesizer::from_config(&self.config);
                let document =
                    self.step(&progress, "Synthesizing document", || synthesizer.synthesize(&bundle))?;
                metrics.mark_synthesize();

                PackOutput {
                    size: document.html.len(),
                    content_hash: content_hash(&document.html),
                    source: kind,
                    project_type,
                    asset_count: bundle.len(),
                    skipped: bundle.skipped().to_vec(),
                    entry: document.entry,
                    placeholder: document.placeholder,
                    inlined: document.inlined,
                    unresolved: document.unresolved,
                    appended: document.appended,
                    html: document.html,
                    links: Vec::new(),
                    metrics,
                }
            }
        };

        output.metrics.mark_total();
        output.metrics.log_summary();
        progress.info(&format!(
            "{} assets packed into {} bytes ({})",
            output.asset_count, output.size, output.content_hash
        ));
        info!(
            target: "singlefile_pack::packer",
            source = kind,
            size = output.size,
            hash = %output.content_hash,
            assets = output.asset_count,
            "Packed document"
        );

        Ok(output)
    }

    /// Check the size ceiling and hand the document to a deployer
    ///
    /// The deployer is not called when the document is too large.
    pub fn deploy(&self, output: &mut PackOutput, deployer: &dyn Deployer) -> BundleResult<()> {
        check_size(&output.html, self.config.deploy.max_size_bytes())?;

        let progress = if self.progress {
            PackProgress::new()
        } else {
            PackProgress::hidden()
        };
        let links = self.step(&progress, "Deploying", || {
            deployer.deploy(&output.html).map_err(BundleError::Deploy)
        })?;
        output.metrics.mark_deploy();
        // Total covers the deploy phase once there is one
        output.metrics.mark_total();
        output.metrics.log_summary();

        info!(
            target: "singlefile_pack::deploy",
            hash = %output.content_hash,
            links = links.len(),
            "Deployed document"
        );
        output.links = links;
        Ok(())
    }

    /// Pack a source and deploy it with the given deployer
    pub fn pack_and_deploy(
        &self,
        source: PackSource,
        deployer: &dyn Deployer,
    ) -> BundleResult<PackOutput> {
        let mut output = self.pack(source)?;
        self.deploy(&mut output, deployer)?;
        Ok(output)
    }

    /// Pack a source and deploy it to `deploy.endpoint`
    pub fn publish(&self, source: PackSource) -> BundleResult<PackOutput> {
        let deployer = HttpDeployer::from_config(&self.config.deploy)
            .ok_or_else(|| BundleError::Config("deploy.endpoint is not set".to_string()))?
            .timeout(self.config.network.timeout())
            .user_agent(self.config.network.user_agent.clone());
        self.pack_and_deploy(source, &deployer)
    }

    /// Bring the source's raw material in; no unpacking happens here
    fn acquire(&self, source: PackSource) -> BundleResult<Acquired> {
        match source {
            PackSource::Archive(bytes) => Ok(Acquired::Archive(bytes)),
            PackSource::GitHub(identifier) => {
                let repo = GitHubRepo::parse(&identifier)?;
                GitHubSource::new(Arc::clone(&self.fetcher), &self.config.network)
                    .download(&repo)
                    .map(Acquired::Archive)
            }
            PackSource::Url(url) => {
                let mut pages = PageSource::new(Arc::clone(&self.fetcher), &self.config.network);
                if let Some(renderers) = &self.renderers {
                    pages = pages.with_renderers(renderers.clone());
                }
                let page = pages.acquire(&url)?;
                debug!(
                    target: "singlefile_pack::packer",
                    url = %page.url,
                    rendered = page.rendered,
                    stylesheets = page.stylesheets_inlined,
                    "Acquired page"
                );
                Ok(Acquired::Page(page.html))
            }
            PackSource::SingleFile { name, content } => Ok(Acquired::Upload { name, content }),
            PackSource::Directory(path) => Ok(Acquired::Directory(path)),
        }
    }

    /// Unpack acquired material into a bundle or a finished document
    fn extract(&self, acquired: Acquired) -> BundleResult<Extracted> {
        match acquired {
            Acquired::Archive(bytes) => ArchiveReader::from_config(&self.config.bundle)
                .read(&bytes)
                .map(Extracted::Bundle),
            Acquired::Directory(path) => {
                let excludes: Vec<&str> =
                    self.config.bundle.exclude_dirs.iter().map(String::as_str).collect();
                BundleBuilder::new(path)
                    .exclude(&excludes)
                    .build()
                    .map(Extracted::Bundle)
            }
            Acquired::Page(html) => {
                let mut bundle = AssetBundle::new();
                bundle.add("index.html", html);
                Ok(Extracted::Bundle(bundle))
            }
            Acquired::Upload { name, content } => {
                let html = html_from_single_file(&name, &content)?;
                Ok(Extracted::Document { name, html })
            }
        }
    }

    fn optimize_single_file(&self, html: &str) -> String {
        if !self.config.optimize.enabled {
            return html.to_string();
        }
        Optimizer::new()
            .normalize_quotes(self.config.optimize.quotes.applies(true))
            .optimize(html)
    }

    /// Run one phase under a spinner
    fn step<T>(
        &self,
        progress: &PackProgress,
        msg: &str,
        f: impl FnOnce() -> BundleResult<T>,
    ) -> BundleResult<T> {
        let pb = progress.spinner(msg);
        match f() {
            Ok(value) => {
                pb.finish_success(msg);
                Ok(value)
            }
            Err(e) => {
                pb.finish_error(&format!("{}: {}", msg, e));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind() {
        assert_eq!(PackSource::Archive(vec![]).kind(), "archive");
        assert_eq!(PackSource::GitHub("a/b".into()).kind(), "github");
        assert_eq!(
            PackSource::SingleFile {
                name: "a.html".into(),
                content: String::new()
            }
            .kind(),
            "single-file"
        );
        assert_eq!(PackSource::Url("x.org".into()).to_string(), "url x.org");
    }

    #[test]
    fn test_single_file_quotes() {
        let packer = Packer::new(PackConfig::default());
        let output = packer
            .pack(PackSource::SingleFile {
                name: "page.html".into(),
                content: "<p class=\"a\">  hi  </p>".into(),
            })
            .unwrap();
        assert_eq!(output.html, "<p class='a'> hi </p>");
        assert_eq!(output.size, output.html.len());
        assert_eq!(output.entry.as_deref(), Some("page.html"));
    }

    #[test]
    fn test_acquire_leaves_unpacking_to_extract() {
        let packer = Packer::new(PackConfig::default());
        let acquired = packer
            .acquire(PackSource::SingleFile {
                name: "notes.txt".into(),
                content: "plain".into(),
            })
            .unwrap();
        assert!(matches!(acquired, Acquired::Upload { .. }));
        assert!(matches!(
            packer.extract(acquired),
            Err(BundleError::InvalidInput(_))
        ));

        let acquired = packer.acquire(PackSource::Archive(b"junk".to_vec())).unwrap();
        assert!(matches!(packer.extract(acquired), Err(BundleError::Archive(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let packer = Packer::new(PackConfig::default().with_timeout(0));
        let result = packer.pack(PackSource::Archive(vec![]));
        assert!(matches!(result, Err(BundleError::Config(_))));
    }
}
