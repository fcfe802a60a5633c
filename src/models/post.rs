use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PostStatus::Draft),
            "scheduled" => Some(PostStatus::Scheduled),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub guid: String,
    pub orig_link: String,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub image_sha1: Option<String>,
    pub status: PostStatus,
    pub publish_at: Option<DateTime<Utc>>,
    pub source: String,
    pub lang_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub guid: String,
    pub orig_link: String,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub image_sha1: Option<String>,
    pub source: String,
    pub lang_verified: bool,
}

/// Append the signature line to a body, exactly once.
///
/// Posts go through editing and re-saving, so signing must be idempotent:
/// signing an already-signed body returns it unchanged.
pub fn sign_body(body: &str, signature: &str) -> String {
    let trimmed = body.trim_end();
    if trimmed.ends_with(signature) {
        return trimmed.to_string();
    }
    format!("{}\n\n{}", trimmed, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIG: &str = "— Arménie Info";

    #[test]
    fn sign_appends_signature() {
        let signed = sign_body("Un article.", SIG);
        assert!(signed.ends_with(SIG));
        assert!(signed.starts_with("Un article."));
    }

    #[test]
    fn sign_is_idempotent() {
        let once = sign_body("Un article.", SIG);
        let twice = sign_body(&once, SIG);
        assert_eq!(once, twice);
    }

    #[test]
    fn sign_appears_exactly_once() {
        let signed = sign_body(&sign_body("Texte.", SIG), SIG);
        assert_eq!(signed.matches(SIG).count(), 1);
    }

    #[test]
    fn sign_trims_trailing_whitespace() {
        let signed = sign_body("Texte.\n\n\n", SIG);
        assert_eq!(signed, format!("Texte.\n\n{}", SIG));
    }

    #[test]
    fn status_round_trips() {
        for status in [PostStatus::Draft, PostStatus::Scheduled, PostStatus::Published] {
            assert_eq!(PostStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::parse("bogus"), None);
    }
}
