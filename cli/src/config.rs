//! Config file loading for the `linkcard` binary.
//!
//! ```toml
//! [link_preview]
//! site = "https://blog.example"
//! cache_path = ".astro/link-previews.json"
//! timeout_ms = 1500
//! fetch_concurrency = 4
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use linkcard_preview::LinkPreviewConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("site {site:?} is not an absolute URL: {source}")]
    InvalidSite {
        site: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct LinkcardConfig {
    pub link_preview: Option<LinkPreviewConfig>,
}

impl LinkcardConfig {
    /// Load `explicit`, or the default config file when it exists.
    ///
    /// A missing default file yields the default config; a missing explicit
    /// file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    #[must_use]
    pub fn into_link_preview(self) -> LinkPreviewConfig {
        self.link_preview.unwrap_or_default()
    }
}

/// Reject a configured site the transform could not classify links against.
///
/// A blank site counts as unset.
pub fn validate_site(config: &LinkPreviewConfig) -> Result<(), ConfigError> {
    let Some(site) = config.site.as_deref().filter(|site| !site.trim().is_empty()) else {
        return Ok(());
    };
    Url::parse(site.trim())
        .map(|_| ())
        .map_err(|source| ConfigError::InvalidSite {
            site: site.to_string(),
            source,
        })
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".linkcard").join("config.toml"))
}
