//! Minimal server-rendered moderation page. One page, no assets, no
//! templates: the audience is a single moderator following a mail link.

use domain::{timestamp, ItemKind, QueuedItem};
use std::fmt::Write;

pub fn review_page(item: &QueuedItem, base_url: &str) -> String {
    let kind = match item.kind {
        ItemKind::Comment => "comment",
        ItemKind::Mention => "mention",
    };

    let mut page = String::new();
    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Review {kind}</title>\n</head>\n<body>\n\
         <h1>Review {kind}</h1>\n<dl>\n",
    );

    field(&mut page, "Article", &format!("{}{}", base_url, item.uri));
    field(&mut page, "Title", &item.title);
    field(&mut page, "Submitted", &timestamp::format(&item.submitted_at));
    if let Some(source) = &item.source {
        field(&mut page, "Source", source);
    }
    if let Some(name) = &item.name {
        field(&mut page, "Name", name);
    }
    if let Some(email) = &item.email {
        field(&mut page, "Email", email);
    }
    if let Some(web) = &item.web {
        field(&mut page, "Website", web);
    }
    if let Some(title) = &item.mention_title {
        field(&mut page, "Mention title", title);
    }
    page.push_str("</dl>\n");

    if let Some(error) = &item.extraction_error {
        let _ = write!(
            page,
            "<p><strong>Verification failed:</strong> {}</p>\n",
            escape(error)
        );
    }

    // The message is sanitized HTML and is rendered as the published page
    // would render it.
    if let Some(message) = &item.message {
        let _ = write!(page, "<blockquote>{}</blockquote>\n", message);
    }

    let _ = write!(
        page,
        "<form method=\"post\" action=\"{base}/comment/review/{id}\">\n\
         <p><label>Reply:<br><textarea name=\"reply\" rows=\"6\" cols=\"60\"></textarea></label></p>\n\
         <p><label><input type=\"checkbox\" name=\"email_reply\" value=\"1\"> \
         Email the reply to the commenter</label></p>\n\
         <p><button name=\"approve\" value=\"1\">Approve</button> \
         <button name=\"reject\" value=\"1\">Reject</button></p>\n\
         </form>\n</body>\n</html>\n",
        base = base_url,
        id = item.id,
    );
    page
}

fn field(page: &mut String, label: &str, value: &str) {
    let _ = write!(page, "<dt>{}</dt><dd>{}</dd>\n", label, escape(value));
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_submitted_fields_but_not_the_message() {
        let mut item = QueuedItem::comment(
            "/posts/foo",
            "/posts/foo/",
            "Foo <Bar>",
            "Alice & Bob",
            None,
            None,
            "<p>kept as-is</p>",
        );
        item.extraction_error = Some("<oops>".to_string());

        let page = review_page(&item, "https://example.com");
        assert!(page.contains("Alice &amp; Bob"));
        assert!(page.contains("Foo &lt;Bar&gt;"));
        assert!(page.contains("&lt;oops&gt;"));
        assert!(page.contains("<blockquote><p>kept as-is</p></blockquote>"));
        assert!(page.contains(&format!("/comment/review/{}", item.id)));
    }

    #[test]
    fn mention_page_shows_the_source() {
        let item = QueuedItem::mention(
            "/posts/foo",
            "/posts/foo/",
            "Foo",
            "https://blog.example/post",
        );
        let page = review_page(&item, "https://example.com");
        assert!(page.contains("Review mention"));
        assert!(page.contains("https://blog.example/post"));
    }
}
