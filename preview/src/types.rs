//! Domain types for link previews.
//!
//! This module contains the boundary configuration, the cached preview record,
//! and the error types used at internal boundaries. Public entry points never
//! return these errors; they collapse them into the documented fallback.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Link-preview configuration as supplied by the caller.
///
/// Maps to the `[link_preview]` table in config.toml. Every field is optional;
/// [`crate::ResolvedConfig`] applies the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkPreviewConfig {
    /// Canonical site origin used to tell same-site links from external ones.
    pub site: Option<String>,

    /// Location of the persisted preview cache. Default: `.astro/link-previews.json`.
    pub cache_path: Option<PathBuf>,

    /// Per-fetch timeout in milliseconds. Default: 1500.
    pub timeout_ms: Option<u64>,

    /// Maximum simultaneous outbound requests. Default: 4.
    pub fetch_concurrency: Option<usize>,

    /// Description truncation bound in characters. Default: 160.
    pub max_description_length: Option<usize>,

    /// Global network kill-switch. Default: true unless `LINK_PREVIEW_FETCH=0`.
    pub enable_fetch: Option<bool>,

    /// User-Agent header for preview requests.
    pub user_agent: Option<String>,

    /// Accept-Language header for preview requests. Default: `ja,en;q=0.8`.
    pub accept_language: Option<String>,

    /// How many leading bytes are scanned for `<meta charset>`. Default: 4096.
    pub charset_sniff_max_bytes: Option<usize>,

    /// Response body cap in bytes. Default: 5 MiB.
    pub max_download_bytes: Option<u64>,
}

impl LinkPreviewConfig {
    /// Default cache file location.
    pub const DEFAULT_CACHE_PATH: &'static str = ".astro/link-previews.json";

    /// Default per-fetch timeout in milliseconds.
    pub const DEFAULT_TIMEOUT_MS: u64 = 1500;

    /// Default worker-pool size.
    pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

    /// Default description truncation bound.
    pub const DEFAULT_MAX_DESCRIPTION_LENGTH: usize = 160;

    /// Default charset sniffing window.
    pub const DEFAULT_CHARSET_SNIFF_MAX_BYTES: usize = 4096;

    /// Default response body cap (5 MiB).
    pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 5 * 1024 * 1024;

    /// Environment flag; `0` disables network fetching when `enable_fetch` is unset.
    pub const FETCH_ENV_VAR: &'static str = "LINK_PREVIEW_FETCH";
}

/// Metadata extracted from one fetched page, before it is timestamped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagePreview {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute image URL.
    pub image: Option<String>,
    pub site_name: Option<String>,
    /// Encoding label the body was decoded with.
    pub charset: String,
}

/// Durable, cacheable result of fetching one URL.
///
/// Stored as one value of the cache file's top-level object, keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,

    #[serde(default)]
    pub charset: String,

    /// RFC 3339 UTC timestamp of the fetch.
    #[serde(default)]
    pub fetched_at: String,
}

impl PreviewRecord {
    #[must_use]
    pub fn from_preview(preview: PagePreview, fetched_at: String) -> Self {
        Self {
            title: preview.title,
            description: preview.description,
            image: preview.image,
            site_name: preview.site_name,
            charset: preview.charset,
            fetched_at,
        }
    }

    /// True if any displayed text field carries U+FFFD, the mark of a failed decode.
    ///
    /// Correctly-decoded but wrong text is not detected.
    #[must_use]
    pub fn looks_mojibake(&self) -> bool {
        [&self.title, &self.description, &self.site_name]
            .into_iter()
            .flatten()
            .any(|value| value.contains('\u{FFFD}'))
    }
}

/// Why a preview could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no fetch capability configured")]
    NoFetcher,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("response exceeds {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },
}

/// Why the cache file could not be read.
#[derive(Debug, Error)]
pub enum CacheLoadError {
    #[error("failed to read cache file: {0}")]
    Io(#[from] io::Error),

    #[error("cache file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cache file is not a JSON object")]
    NotAnObject,
}

/// Why the cache file could not be written.
#[derive(Debug, Error)]
pub enum CacheWriteError {
    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write cache file: {0}")]
    Io(#[from] io::Error),
}
