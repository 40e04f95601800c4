//! Turns raw reader/remote text into HTML that is safe to store and publish.
//!
//! Two profiles share one allow-list cleaner: `format_comment` converts a
//! reader's Markdown and cleans the result, `clean_fragment` cleans
//! already-HTML content pulled from untrusted remote pages and drops
//! non-semantic formatting on top. Both guarantee that every surviving
//! anchor carries `rel="nofollow"`.

use ammonia::Builder;
use pulldown_cmark::{html::push_html, Event, Parser, Tag, TagEnd};
use std::collections::HashSet;

/// Appended to truncated mention bodies.
pub const ELLIPSIS: &str = "…";

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "strong", "ul", "p",
    "br", "hr", "pre",
];

/// `clean_fragment` profile: same structural set, minus plain formatting
/// elements.
const STRIPPING_TAGS: &[&str] = &[
    "a", "abbr", "blockquote", "code", "em", "li", "ol", "strong", "ul", "p", "br", "hr", "pre",
];

fn cleaner(tags: &'static [&'static str]) -> Builder<'static> {
    let mut builder = Builder::default();
    builder
        .tags(tags.iter().copied().collect())
        .tag_attributes(
            [
                ("a", &["href", "title"][..]),
                ("abbr", &["title"][..]),
                ("acronym", &["title"][..]),
            ]
            .into_iter()
            .filter(|(tag, _)| tags.contains(tag))
            .map(|(tag, attrs)| (tag, attrs.iter().copied().collect()))
            .collect(),
        )
        .generic_attributes(HashSet::new())
        .url_schemes(["http", "https", "mailto"].into_iter().collect())
        .link_rel(Some("nofollow"));
    builder
}

/// Converts a reader comment from Markdown to clean HTML.
///
/// Heading syntax is demoted to paragraphs and image embeds are reduced to
/// their alt text: reader comments may not create page headings or inject
/// images.
pub fn format_comment(raw: &str) -> String {
    let events = Parser::new(raw).filter_map(|event| match event {
        Event::Start(Tag::Heading { .. }) => Some(Event::Start(Tag::Paragraph)),
        Event::End(TagEnd::Heading(_)) => Some(Event::End(TagEnd::Paragraph)),
        Event::Start(Tag::Image { .. }) | Event::End(TagEnd::Image) => None,
        other => Some(other),
    });
    let mut html = String::new();
    push_html(&mut html, events);
    cleaner(ALLOWED_TAGS).clean(&html).to_string()
}

/// Cleans an HTML fragment taken from an untrusted remote page.
pub fn clean_fragment(html: &str) -> String {
    cleaner(STRIPPING_TAGS).clean(html).to_string()
}

/// Truncates mention body HTML without ever cutting inside a tag.
///
/// If the text exceeds `ideal` characters: cut at the last unclosed `<`
/// before `ideal` if that would leave a tag open, otherwise at the first
/// sentence-ending punctuation or `<` after `ideal`; hard-cut at `max` if
/// still over; append the ellipsis marker.
pub fn trim_html(html: &str, ideal: usize, max: usize) -> String {
    if html.chars().count() <= ideal {
        return html.to_string();
    }

    let ideal_byte = byte_of_char(html, ideal);
    let head = &html[..ideal_byte];
    let last_open = head.rfind('<');
    let last_close = head.rfind('>');

    let mut out: &str = html;
    match last_open {
        Some(open) if last_close.map_or(true, |close| close < open) => {
            out = &html[..open];
        }
        _ => {
            if let Some(offset) = html[ideal_byte..].find(|c| matches!(c, '.' | '?' | '!' | '<')) {
                out = &html[..ideal_byte + offset];
            }
        }
    }

    let mut trimmed = if out.chars().count() > max {
        out[..byte_of_char(out, max)].to_string()
    } else {
        out.to_string()
    };
    trimmed.push_str(ELLIPSIS);
    trimmed
}

fn byte_of_char(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map(|(b, _)| b).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_tags_never_survive() {
        let out = format_comment("hello <script>alert(1)</script> world");
        assert!(!out.contains("<script"));
        assert!(!out.contains("alert(1)"));
    }

    #[test]
    fn javascript_urls_never_survive() {
        let out = format_comment(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!out.contains("javascript:"));

        let out = clean_fragment(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!out.contains("javascript:"));
    }

    #[test]
    fn every_anchor_gets_nofollow() {
        let out = format_comment("[link](http://example.com) and <a href=\"http://other.example\">raw</a>");
        let anchors = out.matches("<a ").count();
        assert!(anchors >= 2);
        assert_eq!(out.matches("rel=\"nofollow\"").count(), anchors);
    }

    #[test]
    fn headings_are_demoted_to_paragraphs() {
        let out = format_comment("# Big claim");
        assert!(!out.contains("<h1"));
        assert!(out.contains("<p>Big claim</p>"));
    }

    #[test]
    fn images_are_reduced_to_alt_text() {
        let out = format_comment("look ![cat photo](http://example.com/cat.png)");
        assert!(!out.contains("<img"));
        assert!(out.contains("cat photo"));
    }

    #[test]
    fn markdown_formatting_still_works() {
        let out = format_comment("some *emphasis* and `code`");
        assert!(out.contains("<em>emphasis</em>"));
        assert!(out.contains("<code>code</code>"));
    }

    #[test]
    fn unknown_tags_keep_their_text() {
        let out = clean_fragment("<article><span>kept</span></article>");
        assert!(out.contains("kept"));
        assert!(!out.contains("<article"));
    }

    #[test]
    fn stripping_profile_drops_plain_formatting() {
        let out = clean_fragment("<b>bold</b> and <strong>strong</strong>");
        assert!(!out.contains("<b>"));
        assert!(out.contains("bold"));
        assert!(out.contains("<strong>strong</strong>"));
    }

    #[test]
    fn short_input_is_untouched() {
        assert_eq!(trim_html("short text", 2000, 2500), "short text");
    }

    #[test]
    fn trim_never_cuts_inside_a_tag() {
        // An anchor spanning the ideal boundary: cut falls back to its '<'.
        let mut input = "x".repeat(1990);
        input.push_str("<a href=\"http://example.com/long/path\">link text</a>");
        input.push_str(&"y".repeat(600));
        let out = trim_html(&input, 2000, 2500);
        assert!(out.ends_with(ELLIPSIS));
        let body = &out[..out.len() - ELLIPSIS.len()];
        assert!(!body.contains('<'));
        assert_eq!(body.chars().count(), 1990);
    }

    #[test]
    fn trim_cuts_at_sentence_end_after_ideal() {
        let mut input = "x".repeat(2100);
        input.push_str(". trailing words");
        let out = trim_html(&input, 2000, 2500);
        assert_eq!(out, format!("{}{}", "x".repeat(2100), ELLIPSIS));
    }

    #[test]
    fn trim_respects_hard_maximum() {
        let input = "z".repeat(5000);
        let out = trim_html(&input, 2000, 2500);
        assert!(out.chars().count() <= 2500 + ELLIPSIS.chars().count());
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn trim_is_multibyte_safe() {
        let input = "ä".repeat(3000);
        let out = trim_html(&input, 2000, 2500);
        assert!(out.chars().count() <= 2501);
        assert!(out.ends_with(ELLIPSIS));
    }
}
