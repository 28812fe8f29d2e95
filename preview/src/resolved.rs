//! Configuration resolution.
//!
//! Turns the optional boundary-level [`LinkPreviewConfig`] into a
//! [`ResolvedConfig`] with no `Option` knobs left. Resolution never fails:
//! unusable values fall back to their defaults.
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::types::LinkPreviewConfig;

pub(crate) const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; LinkPreviewBot/1.0; +https://github.com/)";
pub(crate) const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml";
pub(crate) const DEFAULT_ACCEPT_LANGUAGE: &str = "ja,en;q=0.8";
const FALLBACK_LINK_BASE: &str = "https://example.com";

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Parsed site origin. `None` when absent or unparsable; then no link is external.
    pub site: Option<Url>,
    /// Base for resolving hrefs into display hosts: the site, or `https://example.com`
    /// when no site is configured. `None` when a site was given but is unparsable;
    /// cards then show the raw href, absolute or not.
    pub link_base: Option<Url>,
    pub cache_path: PathBuf,
    pub timeout: Duration,
    /// Always at least 1.
    pub fetch_concurrency: usize,
    /// 0 disables description truncation.
    pub max_description_length: usize,
    pub enable_fetch: bool,
    pub user_agent: String,
    pub accept_language: String,
    pub charset_sniff_max_bytes: usize,
    pub max_download_bytes: u64,
}

impl ResolvedConfig {
    #[must_use]
    pub fn from_config(config: &LinkPreviewConfig) -> Self {
        let site = config.site.as_deref().and_then(parse_site);
        let site_given = config.site.as_deref().is_some_and(|s| !s.trim().is_empty());
        if site_given && site.is_none() {
            tracing::warn!(
                site = config.site.as_deref().unwrap_or_default(),
                "Link preview site is not a valid URL; treating every link as internal"
            );
        }
        let link_base = if site_given {
            site.clone()
        } else {
            parse_site(FALLBACK_LINK_BASE)
        };

        let cache_path = config
            .cache_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(LinkPreviewConfig::DEFAULT_CACHE_PATH));

        let timeout = Duration::from_millis(
            config
                .timeout_ms
                .unwrap_or(LinkPreviewConfig::DEFAULT_TIMEOUT_MS),
        );

        let fetch_concurrency = config
            .fetch_concurrency
            .unwrap_or(LinkPreviewConfig::DEFAULT_FETCH_CONCURRENCY)
            .max(1);

        let max_description_length = config
            .max_description_length
            .unwrap_or(LinkPreviewConfig::DEFAULT_MAX_DESCRIPTION_LENGTH);

        let enable_fetch = config.enable_fetch.unwrap_or_else(|| {
            fetch_enabled_by_env(
                std::env::var(LinkPreviewConfig::FETCH_ENV_VAR)
                    .ok()
                    .as_deref(),
            )
        });

        let user_agent = config
            .user_agent
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let accept_language = config
            .accept_language
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ACCEPT_LANGUAGE.to_string());

        let charset_sniff_max_bytes = config
            .charset_sniff_max_bytes
            .unwrap_or(LinkPreviewConfig::DEFAULT_CHARSET_SNIFF_MAX_BYTES);

        let max_download_bytes = config
            .max_download_bytes
            .unwrap_or(LinkPreviewConfig::DEFAULT_MAX_DOWNLOAD_BYTES)
            .max(1);

        Self {
            site,
            link_base,
            cache_path,
            timeout,
            fetch_concurrency,
            max_description_length,
            enable_fetch,
            user_agent,
            accept_language,
            charset_sniff_max_bytes,
            max_download_bytes,
        }
    }

    pub(crate) fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_config(&LinkPreviewConfig::default())
    }
}

fn parse_site(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Url::parse(trimmed).ok()
}

/// Fetching stays on unless the flag is exactly `0`.
fn fetch_enabled_by_env(value: Option<&str>) -> bool {
    value.is_none_or(|raw| raw.trim() != "0")
}
