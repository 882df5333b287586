//! URL extraction for link-aware matching.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Matches `[text](target "title")` and captures the target.
static INLINE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("inline link regex")
});

/// Matches `<https://...>` autolinks.
static AUTOLINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<((?:https?|ftp)://[^>\s]+)>").expect("autolink regex")
});

/// Matches bare absolute URLs.
static BARE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?|ftp)://[^\s<>()\[\]]+").expect("bare url regex")
});

/// Extract every URL-like substring of `text`, canonicalized and deduplicated
/// in order of first appearance.
///
/// Pure in-page anchors (`#section`) are not URLs.
pub fn extract_urls(text: &str) -> Vec<String> {
    let inline = INLINE_LINK_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()));
    let auto = AUTOLINK_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()));
    let bare = BARE_URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']));

    let mut urls: Vec<String> = Vec::new();
    for raw in inline.chain(auto).chain(bare) {
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        let canonical = canonicalize(raw);
        if !urls.contains(&canonical) {
            urls.push(canonical);
        }
    }
    urls
}

/// Canonical form of a URL; unparseable (relative) targets are kept verbatim.
pub fn canonicalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_inline_links() {
        let urls = extract_urls("[Tool](https://tools.example.com/tool) - desc");
        assert_eq!(urls, vec!["https://tools.example.com/tool"]);
    }

    #[test]
    fn inline_link_title_is_not_part_of_the_url() {
        let urls = extract_urls(r#"[A](https://a.dev/x "A title")"#);
        assert_eq!(urls, vec!["https://a.dev/x"]);
    }

    #[test]
    fn autolinks_and_bare_urls() {
        let urls = extract_urls("see <https://a.dev/docs> and http://b.dev/page.");
        assert_eq!(urls, vec!["https://a.dev/docs", "http://b.dev/page"]);
    }

    #[test]
    fn canonical_forms_deduplicate() {
        let urls = extract_urls("[A](https://A.dev) mirrors https://a.dev/");
        assert_eq!(urls, vec!["https://a.dev/"]);
    }

    #[test]
    fn relative_targets_kept_and_anchors_skipped() {
        let urls = extract_urls("[Docs](./docs/setup.md) [Top](#top)");
        assert_eq!(urls, vec!["./docs/setup.md"]);
    }

    #[test]
    fn no_urls() {
        assert!(extract_urls("Feature 1 added recently").is_empty());
        assert!(extract_urls("").is_empty());
    }
}
