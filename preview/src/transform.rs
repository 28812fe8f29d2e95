//! Bare-link paragraph rewriting.
//!
//! One [`LinkPreview::transform`] call:
//!
//! 1. walks the tree once and records every bare-link paragraph by path,
//! 2. resolves previews for the distinct external http(s) hrefs,
//! 3. persists the file cache if it changed,
//! 4. replaces each recorded paragraph with a link card.
//!
//! Replacement assigns in place at the recorded path, so sibling indices
//! captured in step 1 stay valid while earlier candidates are rewritten.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use linkcard_types::{Node, normalize_whitespace, text_content};

use crate::cache::PreviewCache;
use crate::card::LinkCard;
use crate::http::{HttpFetcher, PreviewFetcher};
use crate::links::{is_eligible_href, is_fetchable};
use crate::resolved::ResolvedConfig;
use crate::resolver::PreviewResolver;
use crate::types::{LinkPreviewConfig, PreviewRecord};

/// A bare-link paragraph found during the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Child indices from the tree root to the paragraph.
    pub path: Vec<usize>,
    pub href: String,
    /// Whitespace-normalized text of the anchor.
    pub link_text: String,
}

/// The link-card rewriter.
///
/// Holds configuration and the fetch capability; all caches are created per
/// [`transform`](Self::transform) call and dropped when it returns.
pub struct LinkPreview {
    config: ResolvedConfig,
    fetcher: Option<Arc<dyn PreviewFetcher>>,
}

impl std::fmt::Debug for LinkPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPreview")
            .field("config", &self.config)
            .field("has_fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl LinkPreview {
    /// Rewriter using the default HTTP fetcher.
    #[must_use]
    pub fn new(config: &LinkPreviewConfig) -> Self {
        let fetcher = match HttpFetcher::new() {
            Ok(fetcher) => Some(Arc::new(fetcher) as Arc<dyn PreviewFetcher>),
            Err(e) => {
                tracing::warn!("Link previews will not be fetched: {e}");
                None
            }
        };
        Self::with_fetcher(config, fetcher)
    }

    /// Rewriter using `fetcher`; `None` turns every fetch into a miss.
    #[must_use]
    pub fn with_fetcher(
        config: &LinkPreviewConfig,
        fetcher: Option<Arc<dyn PreviewFetcher>>,
    ) -> Self {
        Self {
            config: ResolvedConfig::from_config(config),
            fetcher,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Rewrite every bare-link paragraph in `tree` into a link card.
    ///
    /// Never fails: links whose preview cannot be resolved still become cards
    /// built from the link text and hostname.
    pub async fn transform(&self, tree: &mut Node) {
        let candidates = collect_candidates(tree);
        if candidates.is_empty() {
            return;
        }

        let site = self.config.site.as_ref();
        let mut seen = HashSet::new();
        let urls: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.href.as_str())
            .filter(|href| is_fetchable(href, site))
            .filter(|href| seen.insert(*href))
            .map(str::to_string)
            .collect();

        let resolver = PreviewResolver::new(
            self.config.clone(),
            self.fetcher.clone(),
            PreviewCache::load(&self.config.cache_path),
        );
        let previews = resolver.resolve_all(&urls).await;
        let cache_written = resolver.persist();

        let replaced = replace_candidates(tree, &candidates, &previews, &self.config);

        tracing::info!(
            candidates = candidates.len(),
            external = urls.len(),
            resolved = previews.len(),
            fetched = resolver.fetch_attempts(),
            replaced,
            cache_written,
            "Link preview transform finished"
        );
    }
}

/// Depth-first search for bare-link paragraphs.
///
/// A matched paragraph is not searched further. The tree node itself is never
/// a candidate; only nodes with a parent can be replaced.
#[must_use]
pub fn collect_candidates(tree: &Node) -> Vec<LinkCandidate> {
    fn walk(node: &Node, path: &mut Vec<usize>, out: &mut Vec<LinkCandidate>) {
        if !path.is_empty()
            && let Some((href, link_text)) = bare_link(node)
        {
            out.push(LinkCandidate {
                path: path.clone(),
                href,
                link_text,
            });
            return;
        }

        for (index, child) in node.children().unwrap_or_default().iter().enumerate() {
            path.push(index);
            walk(child, path, out);
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(tree, &mut Vec::new(), &mut out);
    out
}

/// Href and link text when `node` is a `<p>` whose only non-blank child is an
/// `<a>` with an eligible href.
fn bare_link(node: &Node) -> Option<(String, String)> {
    let paragraph = node.as_element().filter(|element| element.is("p"))?;

    let mut significant = paragraph
        .children
        .iter()
        .filter(|child| !child.as_text().is_some_and(|text| text.is_blank()));
    let only = significant.next()?;
    if significant.next().is_some() {
        return None;
    }

    let anchor = only.as_element().filter(|element| element.is("a"))?;
    let href = anchor
        .properties
        .get_str("href")
        .filter(|href| is_eligible_href(href))?;

    Some((href.to_string(), normalize_whitespace(&text_content(only))))
}

fn replace_candidates(
    tree: &mut Node,
    candidates: &[LinkCandidate],
    previews: &HashMap<String, PreviewRecord>,
    config: &ResolvedConfig,
) -> usize {
    let site = config.site.as_ref();
    let mut replaced = 0;

    for candidate in candidates {
        let preview = is_fetchable(&candidate.href, site)
            .then(|| previews.get(&candidate.href))
            .flatten();
        let card = LinkCard::new(
            &candidate.href,
            &candidate.link_text,
            preview,
            site,
            config.link_base.as_ref(),
        );

        match tree.at_path_mut(&candidate.path) {
            Some(slot) => {
                *slot = card.into_node();
                replaced += 1;
            }
            None => tracing::debug!(path = ?candidate.path, "Link candidate vanished before replacement"),
        }
    }

    replaced
}
