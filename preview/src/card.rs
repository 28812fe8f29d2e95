//! Link-card construction.

use linkcard_types::{Element, Node};
use url::Url;

use crate::links::{display_parts, is_fetchable};
use crate::types::PreviewRecord;

/// Display fields for one rendered card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCard {
    pub href: String,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub display_url: String,
    pub external: bool,
}

impl LinkCard {
    /// Combine a link with its (optional) preview.
    ///
    /// Title falls back to the link text, then the hostname, then the raw href.
    /// The URL line shows the preview's site name, else hostname, else path.
    #[must_use]
    pub fn new(
        href: &str,
        link_text: &str,
        preview: Option<&PreviewRecord>,
        site: Option<&Url>,
        link_base: Option<&Url>,
    ) -> Self {
        let (host, path) = display_parts(href, link_base).unwrap_or_default();
        let first = |candidates: &[Option<&str>]| {
            candidates
                .iter()
                .flatten()
                .find(|value| !value.is_empty())
                .map_or_else(|| href.to_string(), |value| (*value).to_string())
        };

        let title = first(&[
            preview.and_then(|p| p.title.as_deref()),
            Some(link_text),
            Some(host.as_str()),
        ]);
        let display_url = first(&[
            preview.and_then(|p| p.site_name.as_deref()),
            Some(host.as_str()),
            Some(path.as_str()),
        ]);

        Self {
            href: href.to_string(),
            title,
            description: preview
                .and_then(|p| p.description.clone())
                .filter(|d| !d.is_empty()),
            image: preview
                .and_then(|p| p.image.clone())
                .filter(|i| !i.is_empty()),
            display_url,
            external: is_fetchable(href, site),
        }
    }

    /// Render as `div.link-preview > a.link-card > (div.link-card__body, div.link-card__thumb?)`.
    #[must_use]
    pub fn into_node(self) -> Node {
        let mut anchor = Element::new("a")
            .with_property("href", self.href)
            .with_class(["link-card", "card"]);
        if self.external {
            anchor = anchor
                .with_property("target", "_blank")
                .with_property("rel", "noreferrer noopener");
        }

        let mut body = vec![block("link-card__title", self.title)];
        if let Some(description) = self.description {
            body.push(block("link-card__description", description));
        }
        body.push(block("link-card__url", self.display_url));

        let mut anchor_children = vec![
            Element::new("div")
                .with_class(["link-card__body"])
                .with_children(body)
                .into(),
        ];
        if let Some(image) = self.image {
            let img = Element::new("img")
                .with_property("src", image)
                .with_property("alt", "")
                .with_property("loading", "lazy")
                .with_property("decoding", "async")
                .with_property("referrerpolicy", "no-referrer");
            anchor_children.push(
                Element::new("div")
                    .with_class(["link-card__thumb"])
                    .with_children(vec![img.into()])
                    .into(),
            );
        }

        Element::new("div")
            .with_class(["link-preview", "not-prose"])
            .with_children(vec![anchor.with_children(anchor_children).into()])
            .into()
    }
}

fn block(class: &str, text: String) -> Node {
    Element::new("div")
        .with_class([class])
        .with_children(vec![Node::text(text)])
        .into()
}
