//! Maps a site-relative article URI onto the generated site output and
//! recovers the article's repository path and title from the rendered page.
//! The comment form on every article page declares its own source path in a
//! `data-path` attribute; that marker is the single source of truth for
//! where comments belong in the repository.

use domain::ModerationError;
use scraper::{Html, Selector};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct Article {
    /// Repository-relative directory of the article, as declared by the page.
    pub path: String,
    pub title: String,
}

#[derive(Clone)]
pub struct ArticleResolver {
    public_dir: PathBuf,
}

impl ArticleResolver {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub async fn resolve(&self, uri: &str) -> Result<Article, ModerationError> {
        let not_found = || ModerationError::NotFound(format!("article {}", uri));

        let mut candidate = self.public_dir.clone();
        let trimmed = uri.trim_matches('/');
        if !trimmed.is_empty() {
            for segment in trimmed.split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(not_found());
                }
                candidate.push(segment);
            }
        }
        candidate.push("index.html");

        // Canonicalize both sides so symlinks or lingering traversal
        // sequences cannot escape the output directory.
        let root = fs::canonicalize(&self.public_dir)
            .await
            .map_err(|_| not_found())?;
        let candidate = fs::canonicalize(&candidate).await.map_err(|_| not_found())?;
        if !candidate.starts_with(&root) {
            return Err(not_found());
        }

        let contents = fs::read_to_string(&candidate).await.map_err(|_| not_found())?;

        let doc = Html::parse_document(&contents);
        // Attribute values and title text come out of the parser already
        // entity-decoded.
        let form_selector = Selector::parse("form[data-path]").unwrap();
        let title_selector = Selector::parse("title").unwrap();

        let path = doc
            .select(&form_selector)
            .next()
            .and_then(|form| form.value().attr("data-path"))
            .map(str::to_string)
            .ok_or_else(not_found)?;
        let title = doc
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .ok_or_else(not_found)?;

        Ok(Article { path, title })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use std::path::Path;

    async fn write_site(root: &Path, uri_dir: &str, page: &str) {
        let dir = root.join(uri_dir);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("index.html"), page).await.unwrap();
    }

    fn scratch_dir() -> PathBuf {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        std::env::temp_dir().join(format!("site-test-{}", hex::encode(bytes)))
    }

    const PAGE: &str = concat!(
        "<html><head><title>Foo &amp; Friends</title></head><body>",
        r#"<form method="post" data-path="/posts/foo/"><textarea></textarea></form>"#,
        "</body></html>"
    );

    #[tokio::test]
    async fn resolves_path_and_title() {
        let root = scratch_dir();
        write_site(&root, "posts/foo", PAGE).await;

        let resolver = ArticleResolver::new(&root);
        let article = resolver.resolve("/posts/foo").await.unwrap();
        assert_eq!(article.path, "/posts/foo/");
        assert_eq!(article.title, "Foo & Friends");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_traversal() {
        let root = scratch_dir();
        write_site(&root, "posts/foo", PAGE).await;

        let resolver = ArticleResolver::new(&root);
        assert!(resolver.resolve("/../posts/foo").await.is_err());
        assert!(resolver.resolve("/posts/%2e%2e/foo").await.is_err());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn missing_marker_is_not_found() {
        let root = scratch_dir();
        write_site(
            &root,
            "posts/bare",
            "<html><head><title>Bare</title></head><body></body></html>",
        )
        .await;

        let resolver = ArticleResolver::new(&root);
        assert!(matches!(
            resolver.resolve("/posts/bare").await,
            Err(ModerationError::NotFound(_))
        ));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_article_is_not_found() {
        let root = scratch_dir();
        write_site(&root, "posts/foo", PAGE).await;

        let resolver = ArticleResolver::new(&root);
        assert!(resolver.resolve("/posts/missing").await.is_err());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
