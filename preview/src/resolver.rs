//! Fetch-and-cache orchestration.
//!
//! A [`PreviewResolver`] lives for one transform invocation and owns:
//!
//! - the in-memory cache (records served during this invocation),
//! - the file-backed [`PreviewCache`],
//! - the in-flight map coalescing concurrent requests for one URL.
//!
//! Lookup order per URL: memory, then file (unless the record looks like a
//! failed decode and fetching is enabled), then an in-flight fetch, then a new
//! network fetch under the configured timeout. Every failure falls back to the
//! previously cached record, if any.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use futures_util::future::join_all;
use tokio::sync::OnceCell;
use url::Url;

use crate::cache::PreviewCache;
use crate::charset::resolve_charset;
use crate::extract::{extract_meta, page_preview};
use crate::http::{FetchRequest, PreviewFetcher, request_headers};
use crate::links::is_http_url;
use crate::resolved::ResolvedConfig;
use crate::types::{FetchError, PagePreview, PreviewRecord};

type InFlight = Arc<OnceCell<Option<PreviewRecord>>>;

pub struct PreviewResolver {
    config: ResolvedConfig,
    fetcher: Option<Arc<dyn PreviewFetcher>>,
    headers: Vec<(String, String)>,
    memory: Mutex<HashMap<String, PreviewRecord>>,
    file_cache: Mutex<PreviewCache>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    fetch_attempts: AtomicUsize,
}

impl std::fmt::Debug for PreviewResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewResolver")
            .field("config", &self.config)
            .field("has_fetcher", &self.fetcher.is_some())
            .field("fetch_attempts", &self.fetch_attempts.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PreviewResolver {
    #[must_use]
    pub fn new(
        config: ResolvedConfig,
        fetcher: Option<Arc<dyn PreviewFetcher>>,
        file_cache: PreviewCache,
    ) -> Self {
        let headers = request_headers(&config);
        Self {
            config,
            fetcher,
            headers,
            memory: Mutex::new(HashMap::new()),
            file_cache: Mutex::new(file_cache),
            in_flight: Mutex::new(HashMap::new()),
            fetch_attempts: AtomicUsize::new(0),
        }
    }

    /// Preview for `url`, or `None` when it is ineligible or nothing could be
    /// fetched or found in cache.
    pub async fn get_preview(&self, url: &str) -> Option<PreviewRecord> {
        if !is_http_url(url) {
            return None;
        }

        if let Some(hit) = lock(&self.memory).get(url) {
            return Some(hit.clone());
        }

        let cached = lock(&self.file_cache).get(url);
        if let Some(record) = &cached
            && (!self.config.enable_fetch || !record.looks_mojibake())
        {
            lock(&self.memory).insert(url.to_string(), record.clone());
            return cached;
        }

        if !self.config.enable_fetch {
            return cached;
        }

        let cell = lock(&self.in_flight)
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| self.fetch_and_store(url, cached))
            .await
            .clone();

        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(url).is_some_and(|entry| Arc::ptr_eq(entry, &cell)) {
            in_flight.remove(url);
        }

        result
    }

    /// Resolve every URL through a pool of at most `fetch_concurrency` workers.
    ///
    /// Workers claim URLs in input order from a shared cursor. The result maps
    /// each URL that produced a preview to its record.
    pub async fn resolve_all(&self, urls: &[String]) -> HashMap<String, PreviewRecord> {
        let workers = self.config.fetch_concurrency.min(urls.len());
        let cursor = AtomicUsize::new(0);

        join_all((0..workers).map(|_| self.drain(urls, &cursor)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Write the file cache if any entry changed. Failures are logged and swallowed.
    pub fn persist(&self) -> bool {
        let mut cache = lock(&self.file_cache);
        match cache.persist() {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(path = %cache.path().display(), "Failed to write link preview cache: {e}");
                false
            }
        }
    }

    /// Network fetches started so far.
    #[must_use]
    pub fn fetch_attempts(&self) -> usize {
        self.fetch_attempts.load(Ordering::Relaxed)
    }

    async fn drain(&self, urls: &[String], cursor: &AtomicUsize) -> Vec<(String, PreviewRecord)> {
        let mut resolved = Vec::new();
        loop {
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(url) = urls.get(index) else {
                return resolved;
            };
            if let Some(record) = self.get_preview(url).await {
                resolved.push((url.clone(), record));
            }
        }
    }

    async fn fetch_and_store(
        &self,
        url: &str,
        cached: Option<PreviewRecord>,
    ) -> Option<PreviewRecord> {
        match self.fetch_preview(url).await {
            Ok(preview) => {
                let record = PreviewRecord::from_preview(preview, now_rfc3339());
                lock(&self.file_cache).insert(url, &record);
                lock(&self.memory).insert(url.to_string(), record.clone());
                tracing::debug!(url, charset = %record.charset, "Fetched link preview");
                Some(record)
            }
            Err(e) => {
                tracing::debug!(url, fallback = cached.is_some(), "Link preview fetch failed: {e}");
                if let Some(record) = &cached {
                    lock(&self.memory).insert(url.to_string(), record.clone());
                }
                cached
            }
        }
    }

    async fn fetch_preview(&self, url: &str) -> Result<PagePreview, FetchError> {
        let fetcher = self.fetcher.as_deref().ok_or(FetchError::NoFetcher)?;
        let requested = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let request = FetchRequest {
            url: &requested,
            headers: &self.headers,
            max_bytes: self.config.max_download_bytes,
        };

        self.fetch_attempts.fetch_add(1, Ordering::Relaxed);
        let response = if self.config.timeout.is_zero() {
            fetcher.fetch(request).await?
        } else {
            tokio::time::timeout(self.config.timeout, fetcher.fetch(request))
                .await
                .map_err(|_| FetchError::Timeout {
                    timeout_ms: self.config.timeout_ms(),
                })??
        };

        if !response.is_success() {
            return Err(FetchError::Status(response.status));
        }
        if !response.is_html() {
            return Err(FetchError::UnsupportedContentType(
                response.content_type.unwrap_or_default(),
            ));
        }

        let decoded = resolve_charset(
            &response.body,
            response.content_type.as_deref(),
            self.config.charset_sniff_max_bytes,
        );
        let meta = extract_meta(&decoded.html);
        let page_url = response.final_url.as_ref().unwrap_or(&requested);

        Ok(page_preview(
            meta,
            page_url,
            self.config.max_description_length,
            decoded.encoding,
        ))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
