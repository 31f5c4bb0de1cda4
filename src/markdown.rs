//! Markdown-lite rendering of reply text into safe HTML.
//!
//! Reply text comes from a remote service, so everything is HTML-escaped
//! first and only four constructs are turned back into markup: bold,
//! italic, links and line breaks.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static BOLD_STARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("hardcoded regex"));
static BOLD_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(.+?)__").expect("hardcoded regex"));
static ITALIC_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("hardcoded regex"));
static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(.+?)_").expect("hardcoded regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.+?)\]\((.+?)\)").expect("hardcoded regex"));
static LINK_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x00(\d+)\x00").expect("hardcoded regex"));

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];

/// Render `text` to HTML safe to insert into a page.
pub fn render(text: &str) -> String {
    // NUL delimits link placeholders below.
    let escaped = escape_html(&text.replace('\0', ""));

    // Links are lifted out first so emphasis markers inside URLs survive.
    let mut anchors: Vec<String> = Vec::new();
    let without_links = LINK.replace_all(&escaped, |caps: &Captures<'_>| {
        let label = &caps[1];
        let target = caps[2].trim();
        if !is_allowed_target(target) {
            return caps[0].to_string();
        }
        anchors.push(format!(
            r#"<a href="{target}" target="_blank" rel="noopener noreferrer">{}</a>"#,
            emphasize(label)
        ));
        format!("\0{}\0", anchors.len() - 1)
    });

    let emphasized = emphasize(&without_links);
    let linked = LINK_PLACEHOLDER.replace_all(&emphasized, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| anchors.get(index))
            .cloned()
            .unwrap_or_default()
    });

    linked.replace("\r\n", "\n").replace('\n', "<br />")
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn emphasize(text: &str) -> String {
    let text = BOLD_STARS.replace_all(text, "<strong>$1</strong>");
    let text = BOLD_UNDERSCORES.replace_all(&text, "<strong>$1</strong>");
    let text = ITALIC_STAR.replace_all(&text, "<em>$1</em>");
    ITALIC_UNDERSCORE
        .replace_all(&text, "<em>$1</em>")
        .into_owned()
}

/// Only navigational schemes; `javascript:`, `data:` and relative targets are refused.
fn is_allowed_target(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    ALLOWED_SCHEMES
        .iter()
        .any(|allowed| scheme.eq_ignore_ascii_case(allowed))
}
