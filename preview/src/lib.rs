//! Link-preview enrichment for rendered article trees.
//!
//! Finds paragraphs whose only content is a single link, fetches the linked
//! page, extracts its social metadata, and rewrites the paragraph into a
//! link card. Results are cached in memory per invocation and in a JSON file
//! across invocations.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`links`] | Href eligibility and same-origin classification |
//! | [`charset`] | Charset detection and tolerant decoding |
//! | [`extract`] | Open Graph / Twitter Card / `<title>` extraction |
//! | [`http`] | Injectable fetch capability and the reqwest implementation |
//! | [`cache`] | File-backed preview cache |
//! | [`resolver`] | Single-flight, two-tier cached, bounded-concurrency fetching |
//! | [`card`] | Link-card node construction |
//! | [`transform`] | Tree walk and paragraph replacement |
//! | [`html`] | HTML fragment parsing and serialization |
//!
//! # Usage
//!
//! ```ignore
//! use linkcard_preview::{LinkPreview, LinkPreviewConfig, html};
//!
//! let config = LinkPreviewConfig {
//!     site: Some("https://blog.example".into()),
//!     ..Default::default()
//! };
//! let mut tree = html::parse_fragment(r#"<p><a href="https://example.com">Example</a></p>"#);
//! LinkPreview::new(&config).transform(&mut tree).await;
//! println!("{}", html::to_html(&tree));
//! ```
//!
//! # Error Handling
//!
//! Nothing here fails the caller. Fetch, decode, and cache problems are
//! logged through `tracing` and degrade to a card built from the link itself.

pub mod cache;
pub mod card;
pub mod charset;
pub mod extract;
pub mod html;
pub mod http;
pub mod links;
pub mod resolver;
pub mod transform;

mod resolved;
mod types;

pub use cache::PreviewCache;
pub use card::LinkCard;
pub use charset::{DecodedHtml, resolve_charset};
pub use extract::{ExtractedMeta, extract_meta};
pub use http::{FetchFut, FetchRequest, FetchResponse, HttpFetcher, PreviewFetcher};
pub use resolved::ResolvedConfig;
pub use resolver::PreviewResolver;
pub use transform::{LinkCandidate, LinkPreview, collect_candidates};
pub use types::{
    CacheLoadError, CacheWriteError, FetchError, LinkPreviewConfig, PagePreview, PreviewRecord,
};

pub use linkcard_types::{Element, Node, Properties, PropertyValue};
