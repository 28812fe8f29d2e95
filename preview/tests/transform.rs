//! Integration tests for the link-card transform.
//!
//! These drive `LinkPreview::transform` end to end with an in-memory fetcher:
//! candidate discovery → preview resolution → cache persistence → replacement.

mod common;

use std::fs;
use std::time::Duration;

use common::{
    MockFetcher, MockPage, anchor, bare_link, card_anchor, card_field, card_image, config,
    og_page, paragraph,
};
use linkcard_preview::{LinkPreview, LinkPreviewConfig, Node, PreviewCache, PreviewRecord};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[tokio::test]
async fn bare_external_link_becomes_card_without_fetch() {
    let dir = tempdir().unwrap();
    let fetcher = MockFetcher::new().shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), false),
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![bare_link("https://example.com", "Example")]);
    preview.transform(&mut tree).await;

    let card = &tree.children().unwrap()[0];
    let wrapper = card.as_element().unwrap();
    assert!(wrapper.is("div"));
    assert_eq!(wrapper.properties.class_names(), vec!["link-preview", "not-prose"]);

    let anchor = card_anchor(card);
    assert_eq!(anchor.properties.class_names(), vec!["link-card", "card"]);
    assert_eq!(anchor.properties.get_str("href"), Some("https://example.com"));
    assert_eq!(anchor.properties.get_str("target"), Some("_blank"));
    assert_eq!(anchor.properties.get_str("rel"), Some("noreferrer noopener"));

    assert_eq!(card_field(card, "link-card__title").as_deref(), Some("Example"));
    assert_eq!(card_field(card, "link-card__url").as_deref(), Some("example.com"));
    assert_eq!(card_field(card, "link-card__description"), None);
    assert_eq!(card_image(card), None);

    assert_eq!(fetcher.call_count(), 0);
    assert!(!dir.path().join("cache.json").exists());
}

#[tokio::test]
async fn paragraph_with_text_is_left_alone() {
    let dir = tempdir().unwrap();
    let fetcher = MockFetcher::new().shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), true),
        Some(fetcher.clone()),
    );

    let original = Node::root(vec![paragraph(vec![
        Node::text("Read this: "),
        anchor("https://example.com", "Example"),
    ])]);
    let mut tree = original.clone();
    preview.transform(&mut tree).await;

    assert_eq!(tree, original);
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn mailto_and_tel_links_are_never_converted() {
    let dir = tempdir().unwrap();
    let preview = LinkPreview::with_fetcher(&config(&dir.path().join("cache.json"), false), None);

    let original = Node::root(vec![
        paragraph(vec![
            Node::text("  "),
            anchor("mailto:someone@example.com", "mail"),
            Node::text("\n"),
        ]),
        paragraph(vec![Node::text("\t"), anchor("tel:+81-3-0000-0000", "call")]),
        paragraph(vec![anchor("#footnote", "jump")]),
    ]);
    let mut tree = original.clone();
    preview.transform(&mut tree).await;

    assert_eq!(tree, original);
}

#[tokio::test]
async fn same_origin_link_has_no_target_and_is_not_fetched() {
    let dir = tempdir().unwrap();
    let fetcher = MockFetcher::new().shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), true),
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![
        bare_link("https://blog.kiakiraki.dev/blog", "Blog"),
        bare_link("/about", ""),
    ]);
    preview.transform(&mut tree).await;

    let children = tree.children().unwrap();
    for card in children {
        let anchor = card_anchor(card);
        assert!(!anchor.properties.contains_key("target"));
        assert!(!anchor.properties.contains_key("rel"));
    }
    assert_eq!(card_field(&children[0], "link-card__title").as_deref(), Some("Blog"));
    assert_eq!(
        card_field(&children[1], "link-card__title").as_deref(),
        Some("blog.kiakiraki.dev")
    );
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn nested_cards_are_replaced_in_place() {
    let dir = tempdir().unwrap();
    let preview = LinkPreview::with_fetcher(&config(&dir.path().join("cache.json"), false), None);

    let mut tree = Node::root(vec![
        bare_link("https://a.example", "A"),
        paragraph(vec![Node::text("middle")]),
        linkcard_preview::Element::new("blockquote")
            .with_children(vec![
                bare_link("https://b.example", "B"),
                bare_link("https://c.example", "C"),
            ])
            .into(),
    ]);
    preview.transform(&mut tree).await;

    let children = tree.children().unwrap();
    assert_eq!(children.len(), 3);
    assert_eq!(card_field(&children[0], "link-card__title").as_deref(), Some("A"));
    assert!(children[1].as_element().unwrap().is("p"));
    let quoted = children[2].children().unwrap();
    assert_eq!(card_field(&quoted[0], "link-card__title").as_deref(), Some("B"));
    assert_eq!(card_field(&quoted[1], "link-card__title").as_deref(), Some("C"));
}

#[tokio::test]
async fn shift_jis_title_is_decoded() {
    let dir = tempdir().unwrap();
    let mut body = b"<html><head><title>".to_vec();
    body.extend_from_slice(&[0x82, 0xa0, 0x82, 0xa2]);
    body.extend_from_slice(b"</title></head><body></body></html>");

    let fetcher = MockFetcher::new()
        .with_page(
            "https://example.com/sjis",
            MockPage::html(body).with_content_type("text/html; charset=Shift_JIS"),
        )
        .shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), true),
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![bare_link("https://example.com/sjis", "sjis")]);
    preview.transform(&mut tree).await;

    let title = card_field(&tree.children().unwrap()[0], "link-card__title").unwrap();
    assert_eq!(title, "あい");
    assert!(!title.contains('\u{FFFD}'));

    let cached = PreviewCache::load(dir.path().join("cache.json"))
        .get("https://example.com/sjis")
        .unwrap();
    assert_eq!(cached.charset, "shift_jis");
}

#[tokio::test]
async fn entities_in_og_fields_are_decoded() {
    let dir = tempdir().unwrap();
    let fetcher = MockFetcher::new()
        .with_page(
            "https://example.com/entities",
            MockPage::html(og_page("A&nbsp;|&nbsp;B", "C&amp;D", "/cover.png")),
        )
        .shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), true),
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![bare_link("https://example.com/entities", "link")]);
    preview.transform(&mut tree).await;

    let card = &tree.children().unwrap()[0];
    assert_eq!(card_field(card, "link-card__title").as_deref(), Some("A | B"));
    assert_eq!(card_field(card, "link-card__description").as_deref(), Some("C&D"));
    assert_eq!(
        card_image(card).as_deref(),
        Some("https://example.com/cover.png")
    );
}

#[tokio::test]
async fn long_descriptions_are_truncated() {
    let dir = tempdir().unwrap();
    let long = "word ".repeat(100);
    let fetcher = MockFetcher::new()
        .with_page(
            "https://example.com/long",
            MockPage::html(og_page("Long", &long, "")),
        )
        .shared();
    let preview = LinkPreview::with_fetcher(
        &LinkPreviewConfig {
            max_description_length: Some(20),
            ..config(&dir.path().join("cache.json"), true)
        },
        Some(fetcher),
    );

    let mut tree = Node::root(vec![bare_link("https://example.com/long", "long")]);
    preview.transform(&mut tree).await;

    let description =
        card_field(&tree.children().unwrap()[0], "link-card__description").unwrap();
    assert_eq!(description.chars().count(), 20);
    assert!(description.ends_with('…'));
}

#[tokio::test]
async fn transform_is_idempotent() {
    let dir = tempdir().unwrap();
    let fetcher = MockFetcher::new()
        .with_page(
            "https://example.com/",
            MockPage::html(og_page("Example Domain", "About", "/i.png")),
        )
        .shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), true),
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![bare_link("https://example.com/", "Example")]);
    preview.transform(&mut tree).await;
    let once = tree.clone();
    preview.transform(&mut tree).await;

    assert_eq!(tree, once);
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn cache_round_trip_serves_previews_without_network() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join(".astro").join("link-previews.json");
    let url = "https://example.com/post";

    let fetcher = MockFetcher::new()
        .with_page(url, MockPage::html(og_page("Post", "Summary", "img/p.png")))
        .shared();
    let first = LinkPreview::with_fetcher(&config(&cache_path, true), Some(fetcher.clone()));
    let mut tree = Node::root(vec![bare_link(url, "post")]);
    first.transform(&mut tree).await;
    assert_eq!(fetcher.call_count(), 1);

    let raw = fs::read_to_string(&cache_path).unwrap();
    assert!(raw.ends_with('\n'));
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored[url]["title"], "Post");
    assert_eq!(stored[url]["charset"], "utf-8");
    assert!(stored[url]["fetchedAt"].is_string());

    let offline = MockFetcher::new().shared();
    let second = LinkPreview::with_fetcher(&config(&cache_path, false), Some(offline.clone()));
    let mut fresh = Node::root(vec![bare_link(url, "post")]);
    second.transform(&mut fresh).await;

    let card = &fresh.children().unwrap()[0];
    assert_eq!(card_field(card, "link-card__title").as_deref(), Some("Post"));
    assert_eq!(card_field(card, "link-card__description").as_deref(), Some("Summary"));
    assert_eq!(card_image(card).as_deref(), Some("https://example.com/img/p.png"));
    assert_eq!(offline.call_count(), 0);
    assert_eq!(fresh, tree);
}

fn seed_cache(path: &std::path::Path, url: &str, record: &PreviewRecord) {
    let mut cache = PreviewCache::empty(path);
    cache.insert(url, record);
    cache.persist().unwrap();
}

fn garbled() -> PreviewRecord {
    PreviewRecord {
        title: Some("\u{FFFD}\u{FFFD}".into()),
        charset: "utf-8".into(),
        fetched_at: "2025-01-01T00:00:00.000Z".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn garbled_cache_entry_is_refetched() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    let url = "https://example.com/jp";
    seed_cache(&cache_path, url, &garbled());

    let fetcher = MockFetcher::new()
        .with_page(url, MockPage::html(og_page("日本語", "説明", "")))
        .shared();
    let preview = LinkPreview::with_fetcher(&config(&cache_path, true), Some(fetcher.clone()));
    let mut tree = Node::root(vec![bare_link(url, "jp")]);
    preview.transform(&mut tree).await;

    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(
        card_field(&tree.children().unwrap()[0], "link-card__title").as_deref(),
        Some("日本語")
    );
    let cached = PreviewCache::load(&cache_path).get(url).unwrap();
    assert_eq!(cached.title.as_deref(), Some("日本語"));
}

#[tokio::test]
async fn garbled_cache_entry_is_kept_when_fetch_disabled() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    let url = "https://example.com/jp";
    seed_cache(&cache_path, url, &garbled());

    let fetcher = MockFetcher::new().shared();
    let preview = LinkPreview::with_fetcher(&config(&cache_path, false), Some(fetcher.clone()));
    let mut tree = Node::root(vec![bare_link(url, "jp")]);
    preview.transform(&mut tree).await;

    assert_eq!(fetcher.call_count(), 0);
    assert_eq!(
        card_field(&tree.children().unwrap()[0], "link-card__title").as_deref(),
        Some("\u{FFFD}\u{FFFD}")
    );
}

#[tokio::test]
async fn duplicate_links_are_fetched_once() {
    let dir = tempdir().unwrap();
    let url = "https://example.com/dup";
    let fetcher = MockFetcher::new()
        .with_page(
            url,
            MockPage::html(og_page("Dup", "", "")).with_delay(Duration::from_millis(20)),
        )
        .shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), true),
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![
        bare_link(url, "one"),
        bare_link(url, "two"),
        bare_link(url, "three"),
    ]);
    preview.transform(&mut tree).await;

    assert_eq!(fetcher.call_count(), 1);
    for card in tree.children().unwrap() {
        assert_eq!(card_field(card, "link-card__title").as_deref(), Some("Dup"));
    }
}

#[tokio::test]
async fn fetches_respect_concurrency_limit() {
    let dir = tempdir().unwrap();
    let mut fetcher = MockFetcher::new();
    let mut links = Vec::new();
    for i in 0..10 {
        let url = format!("https://site{i}.example/");
        fetcher = fetcher.with_page(
            &url,
            MockPage::html(og_page(&format!("Site {i}"), "", ""))
                .with_delay(Duration::from_millis(15)),
        );
        links.push(bare_link(&url, "site"));
    }
    let fetcher = fetcher.shared();
    let preview = LinkPreview::with_fetcher(
        &LinkPreviewConfig {
            fetch_concurrency: Some(3),
            ..config(&dir.path().join("cache.json"), true)
        },
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(links);
    preview.transform(&mut tree).await;

    assert_eq!(fetcher.call_count(), 10);
    assert_eq!(fetcher.peak(), 3);
    assert_eq!(
        fetcher.calls(),
        (0..10)
            .map(|i| format!("https://site{i}.example/"))
            .collect::<Vec<_>>()
    );
    for (i, card) in tree.children().unwrap().iter().enumerate() {
        assert_eq!(
            card_field(card, "link-card__title"),
            Some(format!("Site {i}"))
        );
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_falls_back_to_cached_record() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    let cached_url = "https://slow.example/cached";
    let uncached_url = "https://slow.example/new";
    seed_cache(&cache_path, cached_url, &garbled());

    let slow = MockPage::html(og_page("Too late", "", "")).with_delay(Duration::from_secs(30));
    let fetcher = MockFetcher::new()
        .with_page(cached_url, slow.clone())
        .with_page(uncached_url, slow)
        .shared();
    let preview = LinkPreview::with_fetcher(
        &LinkPreviewConfig {
            timeout_ms: Some(100),
            ..config(&cache_path, true)
        },
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![
        bare_link(cached_url, "cached"),
        bare_link(uncached_url, "fresh link"),
    ]);
    preview.transform(&mut tree).await;

    assert_eq!(fetcher.call_count(), 2);
    let children = tree.children().unwrap();
    assert_eq!(
        card_field(&children[0], "link-card__title").as_deref(),
        Some("\u{FFFD}\u{FFFD}")
    );
    assert_eq!(
        card_field(&children[1], "link-card__title").as_deref(),
        Some("fresh link")
    );
    assert_eq!(PreviewCache::load(&cache_path).get(cached_url), Some(garbled()));
}

#[tokio::test]
async fn unavailable_pages_fall_back_to_link_text() {
    let dir = tempdir().unwrap();
    let fetcher = MockFetcher::new()
        .with_page(
            "https://example.com/missing",
            MockPage::html(og_page("Not Found", "", "")).with_status(404),
        )
        .with_page(
            "https://example.com/data.json",
            MockPage::html("{}").with_content_type("application/json"),
        )
        .shared();
    let preview = LinkPreview::with_fetcher(
        &config(&dir.path().join("cache.json"), true),
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![
        bare_link("https://example.com/missing", "Missing page"),
        bare_link("https://example.com/data.json", ""),
        bare_link("https://unreachable.example/", "Unreachable"),
    ]);
    preview.transform(&mut tree).await;

    let children = tree.children().unwrap();
    assert_eq!(
        card_field(&children[0], "link-card__title").as_deref(),
        Some("Missing page")
    );
    assert_eq!(
        card_field(&children[1], "link-card__title").as_deref(),
        Some("example.com")
    );
    assert_eq!(
        card_field(&children[2], "link-card__title").as_deref(),
        Some("Unreachable")
    );
    assert_eq!(fetcher.call_count(), 3);
    assert!(!dir.path().join("cache.json").exists());
}

#[tokio::test]
async fn unwritable_cache_path_is_tolerated() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();
    let cache_path = blocker.join("cache.json");

    let fetcher = MockFetcher::new()
        .with_page(
            "https://example.com/",
            MockPage::html(og_page("Example", "", "")),
        )
        .shared();
    let preview = LinkPreview::with_fetcher(&config(&cache_path, true), Some(fetcher));

    let mut tree = Node::root(vec![bare_link("https://example.com/", "x")]);
    preview.transform(&mut tree).await;

    assert_eq!(
        card_field(&tree.children().unwrap()[0], "link-card__title").as_deref(),
        Some("Example")
    );
}

#[tokio::test]
async fn invalid_site_treats_links_as_internal() {
    let dir = tempdir().unwrap();
    let fetcher = MockFetcher::new().shared();
    let preview = LinkPreview::with_fetcher(
        &LinkPreviewConfig {
            site: Some("not a url".into()),
            ..config(&dir.path().join("cache.json"), true)
        },
        Some(fetcher.clone()),
    );

    let mut tree = Node::root(vec![bare_link("https://example.com", "Example")]);
    preview.transform(&mut tree).await;

    assert!(preview.config().site.is_none());
    assert!(preview.config().link_base.is_none());
    let card = &tree.children().unwrap()[0];
    let anchor = card_anchor(card);
    assert!(!anchor.properties.contains_key("target"));
    assert_eq!(card_field(card, "link-card__title").as_deref(), Some("Example"));
    assert_eq!(
        card_field(card, "link-card__url").as_deref(),
        Some("https://example.com")
    );
    assert_eq!(fetcher.call_count(), 0);
}
