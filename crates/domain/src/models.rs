use chrono::NaiveDateTime;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a queued item. Doubles as the storage key and the
/// review URL path segment, so it is restricted to lowercase hex by
/// construction: an `ItemId` can never traverse paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if s.is_empty() {
            return Err("Item ID is empty.".to_string());
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err("Item ID must be a lowercase hex string.".to_string());
        }
        if s.len() > 128 {
            return Err("Item ID is too long.".to_string());
        }
        Ok(Self(s))
    }

    /// 32 random bytes, hex encoded. Unguessable; collisions are treated as
    /// structurally impossible at human moderation rates.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Comment,
    Mention,
}

/// A not-yet-published comment or mention awaiting moderator disposition.
///
/// Serialized field names match the queue files written by earlier
/// deployments, so a pending queue survives an upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedItem {
    pub id: ItemId,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(rename = "date", with = "timestamp")]
    pub submitted_at: NaiveDateTime,
    /// Site-relative path of the target article.
    pub uri: String,
    /// Repository-relative directory of the article, recovered from the
    /// rendered page at submission time and trusted afterwards.
    pub article: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
    /// Sanitized HTML body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Mention only: the remote page asserting the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "mentionTitle", default, skip_serializing_if = "Option::is_none")]
    pub mention_title: Option<String>,
    /// Set when re-verification fails during review. Surfaced to the
    /// moderator, never persisted.
    #[serde(skip)]
    pub extraction_error: Option<String>,
}

impl QueuedItem {
    pub fn comment(
        uri: impl Into<String>,
        article: impl Into<String>,
        title: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
        web: Option<String>,
        message_html: impl Into<String>,
    ) -> Self {
        Self {
            id: ItemId::generate(),
            kind: ItemKind::Comment,
            submitted_at: timestamp::now(),
            uri: uri.into(),
            article: article.into(),
            title: title.into(),
            name: Some(name.into()),
            email,
            web,
            message: Some(message_html.into()),
            source: None,
            mention_title: None,
            extraction_error: None,
        }
    }

    pub fn mention(
        uri: impl Into<String>,
        article: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: ItemId::generate(),
            kind: ItemKind::Mention,
            submitted_at: timestamp::now(),
            uri: uri.into(),
            article: article.into(),
            title: title.into(),
            name: None,
            email: None,
            web: None,
            message: None,
            source: Some(source.into()),
            mention_title: None,
            extraction_error: None,
        }
    }
}

/// Metadata header of a published comment file. Field order is preserved in
/// the committed JSON.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentMeta {
    #[serde(with = "timestamp")]
    pub publish_date: NaiveDateTime,
    pub author: String,
    pub author_url: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    pub id: String,
}

/// Metadata header of a published moderator reply file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMeta {
    pub id: String,
    #[serde(with = "timestamp")]
    pub publish_date: NaiveDateTime,
}

/// UTC timestamps at second precision, serialized as `YYYY-MM-DD HH:MM:SS`.
pub mod timestamp {
    use chrono::{NaiveDateTime, Timelike, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn now() -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        now.with_nanosecond(0).unwrap_or(now)
    }

    pub fn format(value: &NaiveDateTime) -> String {
        value.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(de)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
