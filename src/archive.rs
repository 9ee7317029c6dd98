//! Archive reader: project archives -> [`AssetBundle`]
//!
//! Reads ZIP archives (uploads, GitHub zipballs) as well as tar and
//! gzip-compressed tar archives. Only entries on the text-asset allow-list are
//! admitted. Entry bytes are read sequentially from the container, then decoded
//! in parallel; a failing entry is recorded in [`AssetBundle::skipped`] and never
//! aborts the extraction.

use crate::bundle::{is_text_asset, AssetBundle, SkippedEntry};
use crate::config::{BundleSection, OnEmptyBundle};
use crate::{BundleError, BundleResult};
use rayon::prelude::*;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};

/// Container formats recognized by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP container
    Zip,
    /// gzip-compressed tar
    TarGz,
    /// Uncompressed tar
    Tar,
}

impl ArchiveFormat {
    /// Detect the container format of a byte blob
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            Some(ArchiveFormat::Zip)
        } else if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveFormat::TarGz)
        } else if bytes.len() > 262 && &bytes[257..262] == b"ustar" {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}

/// Entry bytes pulled out of a container, before decoding
enum RawEntry {
    Data { path: String, bytes: Vec<u8> },
    Failed(SkippedEntry),
}

/// Extract every text asset from an archive with default settings
pub fn extract_text_assets(bytes: &[u8]) -> BundleResult<AssetBundle> {
    ArchiveReader::new().read(bytes)
}

/// Archive reader with configurable limits
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    /// Entries larger than this are skipped
    max_entry_size: u64,
    /// Empty bundle policy
    on_empty: OnEmptyBundle,
}

impl Default for ArchiveReader {
    fn default() -> Self {
        Self::from_config(&BundleSection::default())
    }
}

impl ArchiveReader {
    /// Create a reader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reader from the `[bundle]` configuration
    pub fn from_config(config: &BundleSection) -> Self {
        Self {
            max_entry_size: config.max_entry_size,
            on_empty: config.on_empty,
        }
    }

    /// Set the per-entry size limit
    pub fn max_entry_size(mut self, bytes: u64) -> Self {
        self.max_entry_size = bytes;
        self
    }

    /// Set the empty bundle policy
    pub fn on_empty(mut self, policy: OnEmptyBundle) -> Self {
        self.on_empty = policy;
        self
    }

    /// Read an archive into a bundle
    pub fn read(&self, bytes: &[u8]) -> BundleResult<AssetBundle> {
        let format = ArchiveFormat::detect(bytes).ok_or_else(|| {
            BundleError::Archive("Unrecognized archive format (expected zip or tar)".to_string())
        })?;

        let raw = match format {
            ArchiveFormat::Zip => self.read_zip(bytes)?,
            ArchiveFormat::TarGz => {
                self.read_tar(flate2::read::GzDecoder::new(Cursor::new(bytes)))?
            }
            ArchiveFormat::Tar => self.read_tar(Cursor::new(bytes))?,
        };

        // Fan out decoding; collect() joins and keeps archive order
        let decoded: Vec<Result<(String, String), SkippedEntry>> =
            raw.into_par_iter().map(decode_entry).collect();

        let mut bundle = AssetBundle::new();
        for result in decoded {
            match result {
                Ok((path, content)) => bundle.add(path, content),
                Err(skipped) => {
                    warn!(
                        target: "singlefile_pack::archive",
                        path = %skipped.path,
                        reason = %skipped.reason,
                        "Skipping archive entry"
                    );
                    bundle.skip(skipped.path, skipped.reason);
                }
            }
        }

        info!(
            target: "singlefile_pack::archive",
            format = ?format,
            files = bundle.len(),
            skipped = bundle.skipped().len(),
            bytes = bundle.total_size(),
            "Archive extracted"
        );

        if bundle.is_empty() && self.on_empty == OnEmptyBundle::Fail {
            return Err(BundleError::EmptyBundle);
        }

        Ok(bundle)
    }

    fn read_zip(&self, bytes: &[u8]) -> BundleResult<Vec<RawEntry>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| BundleError::Archive(format!("Failed to read zip: {}", e)))?;

        let mut raw = Vec::new();
        for i in 0..archive.len() {
            let mut file = match archive.by_index(i) {
                Ok(file) => file,
                Err(e) => {
                    raw.push(RawEntry::Failed(SkippedEntry {
                        path: format!("#{}", i),
                        reason: format!("Failed to read zip entry: {}", e),
                    }));
                    continue;
                }
            };

            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            if let Some(entry) = self.admit(&name, file.size(), &mut file) {
                raw.push(entry);
            }
        }

        Ok(raw)
    }

    fn read_tar<R: Read>(&self, reader: R) -> BundleResult<Vec<RawEntry>> {
        let mut archive = tar::Archive::new(reader);
        let entries = archive
            .entries()
            .map_err(|e| BundleError::Archive(format!("Failed to read tar: {}", e)))?;

        let mut raw = Vec::new();
        for entry in entries {
            let mut entry =
                entry.map_err(|e| BundleError::Archive(format!("Corrupt tar stream: {}", e)))?;

            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = match entry.path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(e) => {
                    warn!("Skipping tar entry with unreadable path: {}", e);
                    continue;
                }
            };
            let size = entry.size();
            if let Some(raw_entry) = self.admit(&name, size, &mut entry) {
                raw.push(raw_entry);
            }
        }

        Ok(raw)
    }

    /// Apply the allow-list and size limit, then pull the entry's bytes
    fn admit(&self, name: &str, size: u64, reader: &mut impl Read) -> Option<RawEntry> {
        let path = match normalize_entry_path(name) {
            Some(path) => path,
            None => {
                return Some(RawEntry::Failed(SkippedEntry {
                    path: name.to_string(),
                    reason: "path escapes the archive root".to_string(),
                }))
            }
        };

        if !is_text_asset(&path) {
            debug!(target: "singlefile_pack::archive", path = %path, "Not a text asset");
            return None;
        }

        if size > self.max_entry_size {
            return Some(RawEntry::Failed(SkippedEntry {
                path,
                reason: format!("{} bytes exceeds the {} byte limit", size, self.max_entry_size),
            }));
        }

        // Headers can understate the real size; never read past the limit
        let mut bytes = Vec::with_capacity(size as usize);
        let mut limited = reader.take(self.max_entry_size.saturating_add(1));
        match limited.read_to_end(&mut bytes) {
            Ok(_) if bytes.len() as u64 > self.max_entry_size => {
                Some(RawEntry::Failed(SkippedEntry {
                    path,
                    reason: format!(
                        "more than {} bytes despite a declared size of {}",
                        self.max_entry_size, size
                    ),
                }))
            }
            Ok(_) => Some(RawEntry::Data { path, bytes }),
            Err(e) => Some(RawEntry::Failed(SkippedEntry {
                path,
                reason: format!("read failed: {}", e),
            })),
        }
    }
}

fn decode_entry(entry: RawEntry) -> Result<(String, String), SkippedEntry> {
    match entry {
        RawEntry::Data { path, bytes } => match String::from_utf8(bytes) {
            Ok(mut text) => {
                if text.starts_with('\u{feff}') {
                    text.remove(0);
                }
                Ok((path, text))
            }
            Err(e) => Err(SkippedEntry {
                path,
                reason: format!("not valid UTF-8: {}", e.utf8_error()),
            }),
        },
        RawEntry::Failed(skipped) => Err(skipped),
    }
}

/// Normalize an archive entry name to a clean relative slash path
///
/// Returns `None` for names that climb out of the root.
fn normalize_entry_path(name: &str) -> Option<String> {
    let mut parts = Vec::new();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(ArchiveFormat::detect(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(&[0x1f, 0x8b, 8, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(b"<html>"), None);
        assert_eq!(ArchiveFormat::detect(b""), None);
    }

    #[test]
    fn test_normalize_entry_path() {
        assert_eq!(normalize_entry_path("./a/b.css").as_deref(), Some("a/b.css"));
        assert_eq!(normalize_entry_path("/root//x.js").as_deref(), Some("root/x.js"));
        assert_eq!(normalize_entry_path("win\\dir\\i.html").as_deref(), Some("win/dir/i.html"));
        assert_eq!(normalize_entry_path("../evil.js"), None);
        assert_eq!(normalize_entry_path("./"), None);
    }

    #[test]
    fn test_decode_strips_bom() {
        let entry = RawEntry::Data {
            path: "a.css".to_string(),
            bytes: "\u{feff}body{}".as_bytes().to_vec(),
        };
        assert_eq!(
            decode_entry(entry).unwrap(),
            ("a.css".to_string(), "body{}".to_string())
        );
    }

    #[test]
    fn test_decode_rejects_binary() {
        let entry = RawEntry::Data {
            path: "a.js".to_string(),
            bytes: vec![0xff, 0xfe, 0x00],
        };
        let skipped = decode_entry(entry).unwrap_err();
        assert_eq!(skipped.path, "a.js");
        assert!(skipped.reason.contains("UTF-8"));
    }

    #[test]
    fn test_garbage_is_archive_error() {
        let result = extract_text_assets(b"definitely not an archive");
        assert!(matches!(result, Err(BundleError::Archive(_))));
    }
}
