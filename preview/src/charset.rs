//! Charset resolution and decoding of fetched HTML bytes.
//!
//! The label comes from the `Content-Type` header when present, otherwise from
//! a `<meta charset>` or `<meta http-equiv="Content-Type">` tag in the first
//! bytes of the body. Decoding never fails: unknown labels fall back to UTF-8
//! and then to a single-byte decode.

use std::sync::LazyLock;

use encoding_rs::{Encoding, REPLACEMENT, UTF_8};
use regex::Regex;

#[allow(clippy::expect_used)]
static HEADER_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*"?([^;\s"]+)"?"#).expect("valid header charset regex")
});

#[allow(clippy::expect_used)]
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*charset\s*=\s*["']?\s*([^"'\s/>;]+)"#)
        .expect("valid meta charset regex")
});

#[allow(clippy::expect_used)]
static HTTP_EQUIV_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta\s+[^>]*http-equiv\s*=\s*["']?\s*content-type\s*["']?[^>]*content\s*=\s*["'][^"']*charset\s*=\s*([^"';\s/>]+)"#,
    )
    .expect("valid http-equiv charset regex")
});

const UTF8_LABEL: &str = "utf-8";
const LATIN1_LABEL: &str = "latin1";

/// Decoded document text and the label of the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding: String,
}

/// Charset parameter of a `Content-Type` header value, as written.
#[must_use]
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    HEADER_CHARSET_RE
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Look for a declared charset in the first `max_bytes` of an HTML body.
///
/// The window is read as Latin-1 so every byte maps to one char and no
/// sniffing input is ever rejected.
#[must_use]
pub fn sniff_charset(bytes: &[u8], max_bytes: usize) -> Option<String> {
    let sample = &bytes[..bytes.len().min(max_bytes)];
    let text = encoding_rs::mem::decode_latin1(sample);

    META_CHARSET_RE
        .captures(&text)
        .or_else(|| HTTP_EQUIV_CHARSET_RE.captures(&text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Map an encoding label to the canonical name used for decoding.
///
/// UTF-8 spellings, the Shift_JIS family (Windows-31J, CP932, MS932),
/// EUC-JP and ISO-8859-1 are recognized; anything else is returned trimmed
/// and lower-cased. Blank labels yield `None`.
#[must_use]
pub fn normalize_encoding_label(label: &str) -> Option<String> {
    let raw = label.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }

    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect();

    let canonical = match compact.as_str() {
        "utf8" | "unicode11utf8" => UTF8_LABEL,
        "shiftjis" | "windows31j" | "cp932" | "ms932" => "shift_jis",
        "eucjp" => "euc-jp",
        "iso88591" => LATIN1_LABEL,
        _ => return Some(raw),
    };
    Some(canonical.to_string())
}

/// Decode `bytes` using the charset from `content_type`, or a sniffed one.
///
/// Never fails. The byte-order mark is not consulted and, when present, is
/// decoded like any other bytes.
#[must_use]
pub fn resolve_charset(
    bytes: &[u8],
    content_type: Option<&str>,
    sniff_max_bytes: usize,
) -> DecodedHtml {
    let declared = match content_type.and_then(charset_from_content_type) {
        Some(header) => Some(header.to_string()),
        None => sniff_charset(bytes, sniff_max_bytes),
    };
    let label = declared
        .as_deref()
        .and_then(normalize_encoding_label)
        .unwrap_or_else(|| UTF8_LABEL.to_string());

    let mut candidates = vec![label.as_str()];
    if label != UTF8_LABEL {
        candidates.push(UTF8_LABEL);
    }

    for candidate in candidates {
        let Some(encoding) = encoding_for(candidate) else {
            tracing::debug!(label = candidate, "Unsupported charset label");
            continue;
        };
        let (html, _had_errors) = encoding.decode_without_bom_handling(bytes);
        return DecodedHtml {
            html: html.into_owned(),
            encoding: candidate.to_string(),
        };
    }

    DecodedHtml {
        html: encoding_rs::mem::decode_latin1(bytes).into_owned(),
        encoding: LATIN1_LABEL.to_string(),
    }
}

/// Decoder for a label; the replacement encoding counts as unsupported.
fn encoding_for(label: &str) -> Option<&'static Encoding> {
    if label == UTF8_LABEL {
        return Some(UTF_8);
    }
    Encoding::for_label(label.as_bytes()).filter(|encoding| *encoding != REPLACEMENT)
}
