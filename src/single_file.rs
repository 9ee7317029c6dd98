//! Single-file uploads: plain HTML and MHTML web archives
//!
//! An MHTML file is a MIME `multipart/related` container. The first
//! `text/html` part becomes the document; every `text/css` part is decoded and
//! appended to the head as one `<style>` block.

use crate::bundle::extension_of;
use crate::synth::escape_style;
use crate::{BundleError, BundleResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use std::sync::LazyLock;

static BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)boundary\s*=\s*(?:"([^"]+)"|([^;\s]+))"#).expect("valid boundary regex")
});

/// Kind of single-file upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleFileKind {
    /// Plain HTML document
    Html,
    /// MHTML web archive
    Mhtml,
}

impl SingleFileKind {
    /// Determine the kind from a file name, sniffing the content when the
    /// extension is not conclusive
    pub fn detect(name: &str, content: &str) -> Option<Self> {
        match extension_of(name).as_deref() {
            Some("html") | Some("htm") | Some("xhtml") => Some(SingleFileKind::Html),
            Some("mhtml") | Some("mht") => Some(SingleFileKind::Mhtml),
            _ => {
                let (headers, _) = split_headers(content);
                if header_value(headers, "content-type")
                    .is_some_and(|v| v.to_ascii_lowercase().contains("multipart/related"))
                {
                    Some(SingleFileKind::Mhtml)
                } else if content.trim_start().starts_with('<') {
                    Some(SingleFileKind::Html)
                } else {
                    None
                }
            }
        }
    }
}

/// HTML of a single-file upload, before optimization
pub fn html_from_single_file(name: &str, content: &str) -> BundleResult<String> {
    match SingleFileKind::detect(name, content) {
        Some(SingleFileKind::Html) => Ok(content.to_string()),
        Some(SingleFileKind::Mhtml) => extract_mhtml(content),
        None => Err(BundleError::InvalidInput(format!(
            "{} is neither an HTML nor an MHTML file",
            name
        ))),
    }
}

/// Decode the HTML document of an MHTML archive with its stylesheets inlined
pub fn extract_mhtml(content: &str) -> BundleResult<String> {
    let normalized = content.replace("\r\n", "\n");
    let (headers, body) = split_headers(&normalized);
    let content_type = header_value(headers, "content-type").unwrap_or_default();

    let Some(boundary) = BOUNDARY_RE
        .captures(&content_type)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
    else {
        // not multipart: the whole body is the document
        if content_type.to_ascii_lowercase().contains("text/html") {
            let encoding = header_value(headers, "content-transfer-encoding");
            return decode_body(body, encoding.as_deref());
        }
        return Err(BundleError::InvalidInput(
            "MHTML file has no multipart boundary".to_string(),
        ));
    };

    let delimiter = format!("--{}", boundary);
    let mut html = None;
    let mut css = String::new();

    for part in body.split(delimiter.as_str()).skip(1) {
        if part.starts_with("--") {
            break;
        }
        let part = part.strip_prefix('\n').unwrap_or(part);
        let (part_headers, part_body) = split_headers(part);
        let part_type = header_value(part_headers, "content-type")
            .unwrap_or_default()
            .to_ascii_lowercase();
        let encoding = header_value(part_headers, "content-transfer-encoding");

        if part_type.starts_with("text/html") && html.is_none() {
            html = Some(decode_body(part_body, encoding.as_deref())?);
        } else if part_type.starts_with("text/css") {
            match decode_body(part_body, encoding.as_deref()) {
                Ok(text) => {
                    let location = header_value(part_headers, "content-location")
                        .unwrap_or_else(|| "stylesheet".to_string());
                    css.push_str(&format!("/* {} */\n{}\n", location, text));
                }
                Err(e) => tracing::warn!("Skipping undecodable MHTML stylesheet: {}", e),
            }
        }
    }

    let mut html = html.ok_or_else(|| {
        BundleError::InvalidInput("MHTML file contains no text/html part".to_string())
    })?;

    if !css.is_empty() {
        let block = format!("<style>\n{}</style>", escape_style(&css));
        match html.to_ascii_lowercase().find("</head") {
            Some(pos) => html.insert_str(pos, &block),
            None => html.insert_str(0, &block),
        }
    }

    Ok(html)
}

/// Split a MIME entity at the first blank line
fn split_headers(text: &str) -> (&str, &str) {
    match text.find("\n\n") {
        Some(pos) => (&text[..pos], &text[pos + 2..]),
        None => (text, ""),
    }
}

/// Value of a header, with folded continuation lines joined
fn header_value(headers: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for line in headers.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some(v) = value.as_mut() {
                v.push(' ');
                v.push_str(line.trim());
            }
            continue;
        }
        if value.is_some() {
            break;
        }
        if let Some((key, rest)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }
    value
}

fn decode_body(body: &str, encoding: Option<&str>) -> BundleResult<String> {
    let encoding = encoding.map(|e| e.trim().to_ascii_lowercase());
    match encoding.as_deref() {
        Some("quoted-printable") => Ok(decode_quoted_printable(body)),
        Some("base64") => {
            let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| BundleError::InvalidInput(format!("Invalid base64 part: {}", e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Ok(body.to_string()),
    }
}

fn decode_quoted_printable(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        // soft line break
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match hex {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}
