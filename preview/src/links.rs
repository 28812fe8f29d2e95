//! Href classification.

use url::Url;

/// True for absolute `http://` or `https://` URLs. The check is a literal prefix match.
#[must_use]
pub fn is_http_url(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

/// True if `href` may become a link card: non-empty and not a fragment,
/// `mailto:`, or `tel:` link.
#[must_use]
pub fn is_eligible_href(href: &str) -> bool {
    !href.is_empty()
        && !href.starts_with('#')
        && !href.starts_with("mailto:")
        && !href.starts_with("tel:")
}

/// Resolve `href` against `base`. Absolute hrefs parse without a base.
#[must_use]
pub fn resolve_href(href: &str, base: Option<&Url>) -> Option<Url> {
    Url::options().base_url(base).parse(href).ok()
}

/// True when `href` resolves to an origin different from `site`.
///
/// Without a usable site nothing is external.
#[must_use]
pub fn is_external(href: &str, site: Option<&Url>) -> bool {
    let Some(site) = site else {
        return false;
    };
    resolve_href(href, Some(site)).is_some_and(|resolved| resolved.origin() != site.origin())
}

/// An http(s) href that leaves the site. Only these are ever fetched.
#[must_use]
pub fn is_fetchable(href: &str, site: Option<&Url>) -> bool {
    is_http_url(href) && is_external(href, site)
}

/// Hostname and path of `href` for display.
///
/// `None` without a base, even for absolute hrefs, or when `href` does not resolve.
#[must_use]
pub fn display_parts(href: &str, base: Option<&Url>) -> Option<(String, String)> {
    let resolved = resolve_href(href, Some(base?))?;
    Some((
        resolved.host_str().unwrap_or_default().to_string(),
        resolved.path().to_string(),
    ))
}
