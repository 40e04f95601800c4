//! Webmention verification: fetch the remote page claiming a link, confirm
//! the link is really there, and derive author/title/body for review.
//!
//! Extraction is a layered sequence over one result record. The microformat
//! `h-entry` pass runs first when the matching link sits inside one; the
//! `<head>` metadata fallbacks each only fill fields still unset. This keeps
//! future sources cheap to add: append another pass.

use async_trait::async_trait;
use domain::{clean_fragment, trim_html, ExtractionError, ELLIPSIS};
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_BYTES: usize = 1024 * 1024;
const IDEAL_LENGTH: usize = 2000;
const MAX_LENGTH: usize = 2500;

/// What verification learned about the source page. `web` is always set on
/// success; the rest only when the page provided it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionFacts {
    pub name: Option<String>,
    pub web: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
}

#[async_trait]
pub trait MentionVerifier: Send + Sync {
    async fn verify(&self, source: &str, uri: &str) -> Result<MentionFacts, ExtractionError>;
}

pub struct MentionExtractor {
    http: reqwest::Client,
    base_url: String,
}

impl MentionExtractor {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    async fn fetch_html(&self, source: &str) -> Result<String, ExtractionError> {
        let mut response = self
            .http
            .get(source)
            .send()
            .await
            .map_err(|e| ExtractionError::UnreachableSource(e.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !is_html_content_type(&content_type) {
            return Err(ExtractionError::UnsupportedContentType(content_type));
        }

        let mut body = Vec::new();
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| ExtractionError::UnreachableSource(e.to_string()))?;
            let Some(chunk) = chunk else { break };
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_BODY_BYTES {
                body.truncate(MAX_BODY_BYTES);
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl MentionVerifier for MentionExtractor {
    async fn verify(&self, source: &str, uri: &str) -> Result<MentionFacts, ExtractionError> {
        let html = self.fetch_html(source).await?;
        extract(&html, source, &self.base_url, uri)
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type == "text/html" || content_type.starts_with("text/html;")
}

/// Literal selectors cannot fail to parse.
fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap()
}

fn has_class(element: &ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Pure extraction over an already-fetched page.
pub fn extract(
    html: &str,
    source: &str,
    base_url: &str,
    uri: &str,
) -> Result<MentionFacts, ExtractionError> {
    let doc = Html::parse_document(html);
    // Exact string match against the full target URL, no normalization.
    let expected = format!("{}{}", base_url, uri);

    let mut linked = false;
    let mut entry: Option<ElementRef> = None;
    for anchor in doc.select(&selector("a")) {
        if anchor.value().attr("href") != Some(expected.as_str()) {
            continue;
        }
        linked = true;
        entry = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| has_class(el, "h-entry"));
        if entry.is_some() {
            break;
        }
    }
    if !linked {
        return Err(ExtractionError::LinkNotFound);
    }

    let mut facts = MentionFacts::default();

    if let Some(entry) = entry {
        extract_h_entry(&entry, source, &mut facts);
    }

    // Head metadata fallbacks, each only writing a still-unset field.
    if facts.web.is_none() {
        if let Some(link) = doc.select(&selector(r#"link[rel~="canonical"]"#)).next() {
            set_if_present(&mut facts.web, link.value().attr("href").unwrap_or(""));
        }
    }

    if facts.title.is_none() {
        if let Some(meta) = doc.select(&selector(r#"meta[property="og:title"]"#)).next() {
            set_if_present(&mut facts.title, meta.value().attr("content").unwrap_or(""));
        }
    }
    if facts.title.is_none() {
        if let Some(title) = doc.select(&selector("title")).next() {
            set_if_present(&mut facts.title, &element_text(&title));
        }
    }

    for css in [r#"meta[name="description"]"#, r#"meta[property="og:description"]"#] {
        if facts.message.is_some() {
            break;
        }
        if let Some(meta) = doc.select(&Selector::parse(css).unwrap()).next() {
            let cleaned = clean_fragment(&trim_html(
                meta.value().attr("content").unwrap_or("").trim(),
                IDEAL_LENGTH,
                MAX_LENGTH,
            ));
            set_if_present(&mut facts.message, &cleaned);
        }
    }

    if facts.name.is_none() {
        if let Some(meta) = doc.select(&selector(r#"meta[name="author"]"#)).next() {
            set_if_present(&mut facts.name, meta.value().attr("content").unwrap_or(""));
        }
    }

    // Anti-spoofing: the claimed identity link must be same-origin with the
    // page making the claim, otherwise fall back to the page itself.
    let spoofed = match &facts.web {
        Some(web) => !same_origin(web, source),
        None => true,
    };
    if spoofed {
        facts.web = Some(source.to_string());
    }

    if let Some(message) = &facts.message {
        if message.ends_with(ELLIPSIS) {
            let web = facts.web.as_deref().unwrap_or(source);
            facts.message = Some(format!(
                r#"{} <a href="{}" rel="nofollow">more</a>"#,
                message, web
            ));
        }
    }

    Ok(facts)
}

/// Minimal microformats2 read of an `h-entry` container: canonical url,
/// entry name, content HTML (else the whole entry), and author names.
fn extract_h_entry(entry: &ElementRef, source: &str, facts: &mut MentionFacts) {
    if let Some(url_el) = entry.select(&selector(".u-url")).next() {
        let raw = url_el
            .value()
            .attr("href")
            .map(str::to_string)
            .unwrap_or_else(|| element_text(&url_el));
        set_if_present(&mut facts.web, &resolve_against(source, raw.trim()));
    }

    if let Some(name_el) = entry.select(&selector(".p-name")).next() {
        set_if_present(&mut facts.title, &element_text(&name_el));
    }

    let content_html = entry
        .select(&selector(".e-content"))
        .next()
        .map(|el| el.inner_html())
        .unwrap_or_else(|| entry.html());
    facts.message = Some(clean_fragment(&trim_html(
        &content_html,
        IDEAL_LENGTH,
        MAX_LENGTH,
    )));

    // Distinct author names, joined lexicographically.
    let mut authors = BTreeSet::new();
    for author in entry.select(&selector(".p-author")) {
        if has_class(&author, "h-card") {
            let mut found = false;
            for name in author.select(&selector(".p-name")) {
                let name = element_text(&name);
                if !name.is_empty() {
                    authors.insert(name);
                    found = true;
                }
            }
            if !found {
                let name = element_text(&author);
                if !name.is_empty() {
                    authors.insert(name);
                }
            }
        } else {
            let name = element_text(&author);
            if !name.is_empty() {
                authors.insert(name);
            }
        }
    }
    if !authors.is_empty() {
        facts.name = Some(authors.into_iter().collect::<Vec<_>>().join(", "));
    }
}

fn resolve_against(base: &str, candidate: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(candidate)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => candidate.to_string(),
    }
}

fn set_if_present(slot: &mut Option<String>, value: &str) {
    let value = value.trim();
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

fn same_origin(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (Url::parse(a), Url::parse(b)) else {
        return false;
    };
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
