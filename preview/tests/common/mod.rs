//! Shared test utilities and fixtures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkcard_preview::{
    Element, FetchError, FetchFut, FetchRequest, FetchResponse, LinkPreviewConfig, Node,
    PreviewFetcher,
};
use linkcard_types::text_content;
use url::Url;

pub const SITE: &str = "https://blog.kiakiraki.dev";

/// A canned response for one URL.
#[derive(Debug, Clone)]
pub struct MockPage {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl MockPage {
    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// In-memory fetcher that records calls and the peak number of concurrent fetches.
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: HashMap<String, MockPage>,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: MockPage) -> Self {
        let key = Url::parse(url).expect("valid mock URL").to_string();
        self.pages.insert(key, page);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl PreviewFetcher for MockFetcher {
    fn fetch<'a>(&'a self, request: FetchRequest<'a>) -> FetchFut<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.url.to_string());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _active = ActiveGuard(&self.active);

            let Some(page) = self.pages.get(request.url.as_str()).cloned() else {
                return Err(FetchError::Network("connection refused".into()));
            };
            if !page.delay.is_zero() {
                tokio::time::sleep(page.delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            Ok(FetchResponse {
                status: page.status,
                content_type: Some(page.content_type),
                final_url: None,
                body: page.body,
            })
        })
    }
}

pub fn config(cache_path: &Path, enable_fetch: bool) -> LinkPreviewConfig {
    LinkPreviewConfig {
        site: Some(SITE.to_string()),
        cache_path: Some(cache_path.to_path_buf()),
        enable_fetch: Some(enable_fetch),
        ..Default::default()
    }
}

pub fn anchor(href: &str, text: &str) -> Node {
    Element::new("a")
        .with_property("href", href)
        .with_children(vec![Node::text(text)])
        .into()
}

pub fn paragraph(children: Vec<Node>) -> Node {
    Element::new("p").with_children(children).into()
}

pub fn bare_link(href: &str, text: &str) -> Node {
    paragraph(vec![anchor(href, text)])
}

pub fn og_page(title: &str, description: &str, image: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta property="og:title" content="{title}">
    <meta property="og:description" content="{description}">
    <meta property="og:image" content="{image}">
    <title>fallback</title>
</head>
<body></body>
</html>"#
    )
}

/// The `a.link-card` inside a rendered card.
pub fn card_anchor(node: &Node) -> &Element {
    let wrapper = node.as_element().expect("card wrapper element");
    wrapper.children[0].as_element().expect("card anchor element")
}

/// Text of the `div.<class>` inside a rendered card, if present.
pub fn card_field(node: &Node, class: &str) -> Option<String> {
    fn find<'a>(node: &'a Node, class: &str) -> Option<&'a Node> {
        let element = node.as_element()?;
        if element.properties.class_names().contains(&class) {
            return Some(node);
        }
        element.children.iter().find_map(|child| find(child, class))
    }
    find(node, class).map(text_content)
}

/// `src` of the thumbnail image inside a rendered card, if present.
pub fn card_image(node: &Node) -> Option<String> {
    let anchor = card_anchor(node);
    let thumb = anchor.children.get(1)?.as_element()?;
    let img = thumb.children.first()?.as_element()?;
    img.properties.get_str("src").map(str::to_string)
}
