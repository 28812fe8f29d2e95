//! Network fetch capability.
//!
//! [`PreviewFetcher`] is the seam the orchestrator fetches through, so tests
//! and embedders can substitute their own transport. [`HttpFetcher`] is the
//! default implementation over `reqwest`. Per-request timeouts are owned by
//! the caller: dropping the returned future aborts the request.

use std::future::Future;
use std::pin::Pin;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderName, HeaderValue, USER_AGENT};
use url::Url;

use crate::resolved::{DEFAULT_ACCEPT, ResolvedConfig};
use crate::types::FetchError;

/// Boxed future returned by [`PreviewFetcher::fetch`].
pub type FetchFut<'a> = Pin<Box<dyn Future<Output = Result<FetchResponse, FetchError>> + Send + 'a>>;

/// One outbound GET.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a Url,
    /// Header name/value pairs, names lower-cased.
    pub headers: &'a [(String, String)],
    /// Bodies larger than this should be rejected with [`FetchError::TooLarge`].
    pub max_bytes: u64,
}

impl FetchRequest<'_> {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What a fetcher hands back. Status and content type are judged by the caller.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after redirects, when the transport knows it.
    pub final_url: Option<Url>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// A 200 `text/html` response with the given body.
    #[must_use]
    pub fn html(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            final_url: None,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only `text/html` (anywhere in the header, case-insensitive) is processed.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }
}

/// Injectable network capability.
pub trait PreviewFetcher: Send + Sync {
    fn fetch<'a>(&'a self, request: FetchRequest<'a>) -> FetchFut<'a>;
}

/// Headers sent with every preview request.
pub(crate) fn request_headers(config: &ResolvedConfig) -> Vec<(String, String)> {
    vec![
        (USER_AGENT.as_str().to_string(), config.user_agent.clone()),
        (ACCEPT.as_str().to_string(), DEFAULT_ACCEPT.to_string()),
        (
            ACCEPT_LANGUAGE.as_str().to_string(),
            config.accept_language.clone(),
        ),
    ]
}

/// [`PreviewFetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, request: FetchRequest<'_>) -> Result<FetchResponse, FetchError> {
        let mut builder = self.client.get(request.url.clone());
        for (name, value) in request.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                builder = builder.header(name, value);
            }
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let final_url = Some(response.url().clone());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut head = FetchResponse {
            status,
            content_type,
            final_url,
            body: Vec::new(),
        };
        // The body is never read for responses that will be discarded anyway.
        if !head.is_success() || !head.is_html() {
            return Ok(head);
        }

        let max_bytes = request.max_bytes;
        if let Some(len) = response.content_length()
            && len > max_bytes
        {
            return Err(FetchError::TooLarge { max_bytes });
        }

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network_error)?;
            if (head.body.len() + chunk.len()) as u64 > max_bytes {
                return Err(FetchError::TooLarge { max_bytes });
            }
            head.body.extend_from_slice(&chunk);
        }

        Ok(head)
    }
}

impl PreviewFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, request: FetchRequest<'a>) -> FetchFut<'a> {
        Box::pin(self.get(request))
    }
}

fn network_error(err: reqwest::Error) -> FetchError {
    FetchError::Network(err.to_string())
}
