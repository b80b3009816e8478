//! Resolve a module URL to bytes
//!
//! Supported sources:
//!
//! - `http://` and `https://`: blocking GET, any non-2xx status is an error
//! - `file://`: local file
//! - `data:<mime>;base64,<payload>`: inline module
//! - anything that is not an absolute URL: a path on the local filesystem

use crate::error::{LoaderError, Result};
use base64::{engine::general_purpose, Engine as _};
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// Default upper bound on the size of a fetched module (256 MiB).
pub const DEFAULT_MAX_FETCH_BYTES: u64 = 256 * 1024 * 1024;

/// Where a module's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(Url),
    File(PathBuf),
    Data(String),
}

impl Source {
    /// Classify `url` without touching the network or filesystem.
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("data:") {
            return Ok(Source::Data(rest.to_string()));
        }
        match Url::parse(url) {
            // single-letter schemes are Windows drive letters, not URLs
            Ok(parsed) if parsed.scheme().len() == 1 => Ok(Source::File(PathBuf::from(url))),
            Ok(parsed) => match parsed.scheme() {
                "http" | "https" => Ok(Source::Http(parsed)),
                "file" => parsed
                    .to_file_path()
                    .map(Source::File)
                    .map_err(|_| LoaderError::InvalidUrl {
                        url: url.to_string(),
                        reason: "not a local file path".to_string(),
                    }),
                other => Err(LoaderError::UnsupportedScheme(other.to_string())),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Source::File(PathBuf::from(url))),
            Err(e) => Err(LoaderError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Fetch the bytes behind `url`, refusing anything larger than `limit`.
pub fn fetch(url: &str, limit: u64) -> Result<Vec<u8>> {
    let bytes = match Source::parse(url)? {
        Source::Http(parsed) => fetch_http(&parsed, limit)?,
        Source::File(path) => read_file(&path, limit)?,
        Source::Data(payload) => decode_data(&payload)?,
    };
    if bytes.len() as u64 > limit {
        return Err(LoaderError::TooLarge { url: url.to_string(), limit });
    }
    tracing::debug!(target: "fetch", url, bytes = bytes.len(), "fetched module");
    Ok(bytes)
}

fn fetch_http(url: &Url, limit: u64) -> Result<Vec<u8>> {
    let response = ureq::request_url("GET", url).call().map_err(|e| match e {
        ureq::Error::Status(status, _) => LoaderError::HttpStatus {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(t) => LoaderError::Transport {
            url: url.to_string(),
            message: t.to_string(),
        },
    })?;

    let mut bytes = Vec::new();
    // one extra byte so an oversized body is detectable
    response
        .into_reader()
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| LoaderError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(bytes)
}

fn read_file(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| LoaderError::io(&display, e))?;
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| LoaderError::io(&display, e))?;
    Ok(bytes)
}

/// Decode the part of a data URL after `data:`. Only base64 payloads are accepted.
fn decode_data(payload: &str) -> Result<Vec<u8>> {
    let (meta, body) = payload.split_once(',').ok_or_else(|| LoaderError::InvalidUrl {
        url: format!("data:{payload}"),
        reason: "missing ',' separator".to_string(),
    })?;
    if !meta.ends_with(";base64") {
        return Err(LoaderError::InvalidUrl {
            url: format!("data:{meta},..."),
            reason: "only base64 data URLs are supported".to_string(),
        });
    }
    Ok(general_purpose::STANDARD.decode(body.trim())?)
}
