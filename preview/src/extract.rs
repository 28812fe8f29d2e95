//! Social metadata extraction from decoded HTML.
//!
//! Tolerant, regex-based scanning of `<meta>` tags and the `<title>` element.
//! No HTML parser is involved, so malformed or truncated markup only ever
//! yields fewer fields.

use std::collections::HashMap;
use std::sync::LazyLock;

use linkcard_types::{decode_html_entities, normalize_whitespace, truncate_with_ellipsis};
use regex::Regex;
use url::Url;

use crate::links::resolve_href;
use crate::types::PagePreview;

#[allow(clippy::expect_used)]
static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<meta\s+[^>]*?>").expect("valid meta tag regex"));

#[allow(clippy::expect_used)]
static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

#[allow(clippy::expect_used)]
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex")
});

const TITLE_KEYS: &[&str] = &["og:title", "twitter:title"];
const DESCRIPTION_KEYS: &[&str] = &["og:description", "description", "twitter:description"];
const IMAGE_KEYS: &[&str] = &[
    "og:image:secure_url",
    "og:image",
    "twitter:image:src",
    "twitter:image",
];
const SITE_NAME_KEYS: &[&str] = &["og:site_name"];

/// Best-priority metadata fields found in a page. Values are entity-decoded
/// and whitespace-normalized; empty values are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
}

/// Scan `html` for Open Graph, Twitter Card, and `<title>` metadata.
///
/// Title: `og:title`, `twitter:title`, then `<title>`. Description:
/// `og:description`, `description`, `twitter:description`. Image:
/// `og:image:secure_url`, `og:image`, `twitter:image:src`, `twitter:image`.
/// Site name: `og:site_name`.
#[must_use]
pub fn extract_meta(html: &str) -> ExtractedMeta {
    let meta = collect_meta_tags(html);
    let pick = |keys: &[&str]| keys.iter().find_map(|key| meta.get(*key).cloned());

    let title_tag = TITLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_html_entities(&normalize_whitespace(m.as_str())))
        .filter(|title| !title.is_empty());

    ExtractedMeta {
        title: pick(TITLE_KEYS).or(title_tag),
        description: pick(DESCRIPTION_KEYS),
        image: pick(IMAGE_KEYS),
        site_name: pick(SITE_NAME_KEYS),
    }
}

/// Build the cacheable preview for a page: normalize text fields, truncate
/// the description, and resolve the image against `page_url`.
#[must_use]
pub fn page_preview(
    meta: ExtractedMeta,
    page_url: &Url,
    max_description_length: usize,
    charset: String,
) -> PagePreview {
    let non_empty = |value: String| Some(value).filter(|v| !v.is_empty());

    PagePreview {
        title: meta
            .title
            .and_then(|title| non_empty(normalize_whitespace(&title))),
        description: meta.description.and_then(|description| {
            non_empty(truncate_with_ellipsis(&description, max_description_length))
        }),
        image: meta
            .image
            .and_then(|image| resolve_href(&image, Some(page_url)))
            .map(String::from),
        site_name: meta
            .site_name
            .and_then(|site_name| non_empty(normalize_whitespace(&site_name))),
        charset,
    }
}

/// Lower-cased `property` (or `name`) to decoded `content`; first occurrence wins.
fn collect_meta_tags(html: &str) -> HashMap<String, String> {
    let mut meta = HashMap::new();

    for tag in META_TAG_RE.find_iter(html) {
        let mut attrs: HashMap<String, &str> = HashMap::new();
        for caps in ATTRIBUTE_RE.captures_iter(tag.as_str()) {
            let Some(value) = caps.get(2).or_else(|| caps.get(3)) else {
                continue;
            };
            attrs.insert(caps[1].to_lowercase(), value.as_str());
        }

        let attr = |name: &str| {
            attrs
                .get(name)
                .map(|value| normalize_whitespace(value).to_lowercase())
                .unwrap_or_default()
        };
        let key = Some(attr("property"))
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| attr("name"));
        let content = attrs
            .get("content")
            .map(|content| decode_html_entities(&normalize_whitespace(content)))
            .unwrap_or_default();
        if key.is_empty() || content.is_empty() {
            continue;
        }

        meta.entry(key).or_insert(content);
    }

    meta
}
