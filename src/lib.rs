//! singlefile-pack - Single-File HTML Bundling for Permanent Storage
//!
//! This crate turns a web project into **one self-contained HTML document**
//! that can be published to content-addressed permanent storage, where a page
//! cannot fetch sibling files at runtime.
//!
//! # Inputs
//!
//! - **Archive**: uploaded zip (also tar / tar.gz) of a project
//! - **GitHub**: `owner/repo` or a repository URL, fetched as a zip archive
//! - **URL**: a live page, rendered by a render service or fetched raw
//! - **Single file**: an HTML or MHTML document
//! - **Directory**: a project directory on disk
//!
//! # Pipeline
//!
//! 1. Acquisition runs ordered fallback chains over mirrors and relays
//! 2. The archive reader keeps text assets only (extension allow-list)
//! 3. The classifier reports the framework (advisory only)
//! 4. The synthesizer picks the entry document, inlines every stylesheet and
//!    script that resolves to a bundle entry, appends unreferenced assets
//!    once and reassembles a fixed skeleton
//! 5. The optimizer strips comments and collapses whitespace
//! 6. The document is checked against the size ceiling and handed to a
//!    [`Deployer`]
//!
//! # Quick Start
//!
//! ```no_run
//! use singlefile_pack::{PackConfig, PackSource, Packer};
//!
//! let config = PackConfig::load("singlefile.pack.toml")?;
//! let output = Packer::new(config).pack(PackSource::GitHub("octo/site".into()))?;
//! println!("{} bytes, hash {}", output.size, output.content_hash);
//! # Ok::<(), singlefile_pack::BundleError>(())
//! ```
//!
//! ## Configuration File
//!
//! ```toml
//! [bundle]
//! on_empty = "placeholder"
//!
//! [optimize]
//! quotes = "single_file"
//!
//! [network]
//! relays = ["", "https://relay.example/raw?url={url}"]
//! render_endpoints = ["https://render.example/?url={url}"]
//!
//! [deploy]
//! endpoint = "https://deploy.example/api/deploy"
//! max_size_kb = 3000
//! ```

mod acquire;
mod archive;
mod bundle;
mod classify;
mod config;
mod deploy;
mod error;
mod metrics;
mod optimize;
mod packer;
pub mod progress;
mod resolver;
mod single_file;
mod synth;

// Re-export public API
pub use acquire::{
    normalize_page_url, relay_url, AcquiredPage, FallbackChain, Fetch, GitHubRepo, GitHubSource,
    HttpFetcher, HttpRenderService, PageSource, RenderService,
};
pub use archive::{extract_text_assets, ArchiveFormat, ArchiveReader};
pub use bundle::{
    is_markup, is_script, is_style, is_text_asset, AssetBundle, BundleBuilder, SkippedEntry,
    TEXT_EXTENSIONS,
};
pub use classify::{classify, ProjectType};
pub use config::{
    BundleSection, DeploySection, NetworkSection, OnEmptyBundle, OptimizeSection, PackConfig,
    QuotePolicy,
};
pub use deploy::{check_size, content_hash, Deployer, HttpDeployer};
pub use error::{BundleError, BundleResult};
pub use metrics::PackMetrics;
pub use optimize::{optimize, Optimizer, MAX_PASSES};
pub use packer::{PackOutput, PackSource, Packer};
pub use progress::{PackProgress, ProgressExt, ProgressStyles};
pub use resolver::{is_external, resolve, Resolver};
pub use single_file::{extract_mhtml, html_from_single_file, SingleFileKind};
pub use synth::{
    placeholder_document, select_entry, split_regions, synthesize, SynthesizedDocument,
    Synthesizer,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
