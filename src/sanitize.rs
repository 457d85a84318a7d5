//! Lightweight input sanitization for document text and titles

use regex::Regex;
use std::sync::OnceLock;

/// Maximum characters kept from a document body
pub const MAX_TEXT_CHARS: usize = 100_000;

/// Maximum characters kept from a title
pub const MAX_TITLE_CHARS: usize = 200;

struct Patterns {
    script: Regex,
    iframe: Regex,
    javascript: Regex,
    handler: Regex,
    tag: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                script: Regex::new(r"(?is)<script\b.*?</script>").ok()?,
                iframe: Regex::new(r"(?is)<iframe\b.*?</iframe>").ok()?,
                javascript: Regex::new(r"(?i)javascript:").ok()?,
                handler: Regex::new(r"(?i)\bon\w+\s*=").ok()?,
                tag: Regex::new(r"<[^>]*>").ok()?,
            })
        })
        .as_ref()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Cap a document body and strip script/iframe blocks, `javascript:` URLs
/// and inline event handlers.
pub fn sanitize_text(text: &str) -> String {
    let text = truncate_chars(text, MAX_TEXT_CHARS);
    let Some(p) = patterns() else {
        return text.to_string();
    };

    let text = p.script.replace_all(text, "");
    let text = p.iframe.replace_all(&text, "");
    let text = p.javascript.replace_all(&text, "");
    p.handler.replace_all(&text, "").into_owned()
}

/// Cap a title, remove every HTML tag and trim.
pub fn sanitize_title(title: &str) -> String {
    let title = truncate_chars(title, MAX_TITLE_CHARS);
    match patterns() {
        Some(p) => p.tag.replace_all(title, "").trim().to_string(),
        None => title.trim().to_string(),
    }
}
