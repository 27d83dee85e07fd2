//! Chapter body normalization
//!
//! Turns the HTML fragment the origin (or a mirror) returns into indented
//! plain text. Pure and deterministic; running it on its own output is a
//! no-op.

use regex::Regex;
use std::sync::LazyLock;

/// Indent placed before every paragraph line
pub const INDENT: &str = "    ";

struct Patterns {
    header: Regex,
    footer: Regex,
    article: Regex,
    paragraph_open: Regex,
    paragraph_close: Regex,
    any_tag: Regex,
    escaped_angle: Regex,
    blank_run: Regex,
    ordinal_prefix: Regex,
}

// The patterns are literals; compiling them cannot fail at runtime.
#[allow(clippy::expect_used)]
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let compile = |pattern: &str| Regex::new(pattern).expect("normalizer pattern is valid");
    Patterns {
        header: compile(r"(?s)<header>.*?</header>"),
        footer: compile(r"(?s)<footer>.*?</footer>"),
        article: compile(r"</?article>"),
        paragraph_open: compile(r"<p[^>]*>"),
        paragraph_close: compile(r"</p>"),
        any_tag: compile(r"<[^>]+>"),
        escaped_angle: compile(r"\\u003c|\\u003e"),
        blank_run: compile(r"\n{3,}"),
        ordinal_prefix: compile(r"^第[0-9]+章\s*"),
    }
});

/// Normalize a raw chapter body
///
/// Steps run in this order: drop `<header>`/`<footer>` blocks, drop
/// `<article>` wrappers, turn `<p ...>` into a newline plus indent, drop
/// `</p>`, strip every remaining tag, drop the literal `\u003c`/`\u003e`
/// escapes, remove a leading copy of `title`, collapse runs of blank lines,
/// trim, then re-indent every non-blank line.
pub fn normalize(raw: &str, title: Option<&str>) -> String {
    let p = &*PATTERNS;

    let text = p.header.replace_all(raw, "");
    let text = p.footer.replace_all(&text, "");
    let text = p.article.replace_all(&text, "");
    let text = p.paragraph_open.replace_all(&text, "\n    ");
    let text = p.paragraph_close.replace_all(&text, "");
    let text = p.any_tag.replace_all(&text, "");
    let text = p.escaped_angle.replace_all(&text, "");

    let mut text: &str = &text;
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        if let Some(rest) = text.strip_prefix(title) {
            text = rest.trim_start();
        }
    }

    let collapsed = p.blank_run.replace_all(text, "\n\n");

    collapsed
        .trim()
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("{INDENT}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove a leading `第N章` ordinal (and following whitespace) from an origin
/// chapter title, since the artifact writes its own ordinal label
pub fn strip_ordinal_prefix(title: &str) -> String {
    PATTERNS.ordinal_prefix.replace(title, "").into_owned()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = "<header><div>nav <b>x</b></div>\n</header>\
        <article><p class=\"a\">First line.</p>\
        <p>Second <i>line</i>.</p><span>tail</span></article>\
        <footer>\n<p>copyright</p></footer>";

    #[test]
    fn strips_every_recognized_tag_family() {
        let out = normalize(MARKUP, None);

        for needle in [
            "<header", "</header>", "<footer", "</footer>", "<article", "</article>", "<p", "</p>",
            "<i>", "<span>", "nav", "copyright",
        ] {
            assert!(!out.contains(needle), "{needle:?} left in {out:?}");
        }
        assert_eq!(out, "    First line.\n    Second line.tail");
    }

    #[test]
    fn already_clean_text_is_a_fixed_point() {
        for input in [
            "plain sentence",
            "    one\n    two",
            "a\n\n\n\nb\n   c   ",
            "",
        ] {
            let once = normalize(input, None);
            assert_eq!(normalize(&once, None), once, "input {input:?}");
        }
    }

    #[test]
    fn normalizing_twice_equals_once_for_markup() {
        let once = normalize(MARKUP, Some("First"));
        assert_eq!(normalize(&once, Some("First")), once);
    }

    #[test]
    fn duplicate_title_prefix_is_removed() {
        let out = normalize("T rest of text", Some("T"));
        assert_eq!(out, "    rest of text");
        assert!(!out.trim_start().starts_with('T'));
    }

    #[test]
    fn title_elsewhere_in_body_is_kept() {
        let out = normalize("Intro then T appears", Some("T"));
        assert_eq!(out, "    Intro then T appears");
    }

    #[test]
    fn blank_runs_collapse_and_lines_are_reindented() {
        let out = normalize("  a  \n\n\n\n\n\t b\n", None);
        assert_eq!(out, "    a\n    b");
    }

    #[test]
    fn escaped_angle_brackets_are_dropped() {
        let out = normalize(r"x\u003cy\u003ez", None);
        assert_eq!(out, "    xyz");
    }

    #[test]
    fn ordinal_prefix_is_stripped_from_titles() {
        assert_eq!(strip_ordinal_prefix("第12章 风起"), "风起");
        assert_eq!(strip_ordinal_prefix("第3章风起"), "风起");
        assert_eq!(strip_ordinal_prefix("风起 第3章"), "风起 第3章");
        assert_eq!(strip_ordinal_prefix("第十章 风起"), "第十章 风起");
    }
}
