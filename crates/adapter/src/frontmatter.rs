//! Front-matter handling for the article index document. The index is
//! rewritten with a fresh `lastmod` on every publish because downstream site
//! regeneration keys cache invalidation off it.

use anyhow::{anyhow, Context};
use serde_yaml::{Mapping, Value};

const FENCE: &str = "---";

/// Sets `lastmod` in the document's YAML front matter, leaving the body
/// untouched. A document without front matter gains a block holding only
/// `lastmod`.
pub fn set_lastmod(document: &str, lastmod: &str) -> anyhow::Result<String> {
    let (mut metadata, body) = split(document)?;
    metadata.insert(
        Value::String("lastmod".to_string()),
        Value::String(lastmod.to_string()),
    );
    let yaml = serde_yaml::to_string(&metadata).context("front matter serialization")?;
    Ok(format!("{}\n{}{}\n\n{}", FENCE, yaml, FENCE, body))
}

fn split(document: &str) -> anyhow::Result<(Mapping, String)> {
    let Some(rest) = document.strip_prefix(&format!("{}\n", FENCE)) else {
        return Ok((Mapping::new(), document.trim_start().to_string()));
    };
    let end = rest
        .find(&format!("\n{}", FENCE))
        .ok_or_else(|| anyhow!("unterminated front matter"))?;
    let yaml = &rest[..end];
    let body = rest[end + 1 + FENCE.len()..]
        .trim_start_matches('\n')
        .to_string();
    let metadata: Mapping = serde_yaml::from_str(yaml).context("front matter parse")?;
    Ok((metadata, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_existing_lastmod() {
        let doc = "---\ntitle: Foo\nlastmod: 2020-01-01 00:00:00\n---\n\nBody text.\n";
        let out = set_lastmod(doc, "2024-06-01 12:00:00").unwrap();
        assert!(out.contains("lastmod: 2024-06-01 12:00:00"));
        assert!(!out.contains("2020-01-01"));
        assert!(out.contains("title: Foo"));
        assert!(out.ends_with("Body text.\n"));
    }

    #[test]
    fn adds_lastmod_when_absent() {
        let doc = "---\ntitle: Foo\n---\n\nBody.\n";
        let out = set_lastmod(doc, "2024-06-01 12:00:00").unwrap();
        assert!(out.contains("lastmod: 2024-06-01 12:00:00"));
        assert!(out.contains("title: Foo"));
    }

    #[test]
    fn document_without_front_matter_gains_one() {
        let out = set_lastmod("Just a body.\n", "2024-06-01 12:00:00").unwrap();
        assert!(out.starts_with("---\n"));
        assert!(out.contains("lastmod: 2024-06-01 12:00:00"));
        assert!(out.contains("Just a body."));
    }

    #[test]
    fn unterminated_front_matter_is_an_error() {
        assert!(set_lastmod("---\ntitle: Foo\nBody", "now").is_err());
    }
}
