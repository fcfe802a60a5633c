use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Per-feed cap on entries considered in one run.
pub const ENTRY_CAP: usize = 20;

/// One candidate article from a feed.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub guid: String,
    pub link: String,
    pub title: String,
    pub summary_html: Option<String>,
    pub media_urls: Vec<String>,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub source: String,
    pub entries: Vec<FeedEntry>,
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT_STRING)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "Failed to fetch feed {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(&bytes[..])?;

        let source = feed
            .title
            .map(|t| t.content)
            .filter(|t| !t.is_empty())
            .or_else(|| feed.links.first().map(|l| l.href.clone()))
            .unwrap_or_else(|| "Source".to_string());

        let entries: Vec<FeedEntry> = feed
            .entries
            .into_iter()
            .take(ENTRY_CAP)
            .filter_map(|entry| {
                let link = entry
                    .links
                    .first()
                    .map(|l| l.href.trim().to_string())
                    .unwrap_or_default();
                // The feed id is the primary identifier, the link stands in
                // when the feed does not set one. Entries with neither are
                // unidentifiable and dropped.
                let guid = if entry.id.is_empty() {
                    link.clone()
                } else {
                    entry.id.clone()
                };
                if guid.is_empty() {
                    return None;
                }

                // Try full content first, then the summary.
                let summary_html = entry
                    .content
                    .as_ref()
                    .and_then(|c| c.body.clone())
                    .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()));

                let mut media_urls = Vec::new();
                for media in &entry.media {
                    for content in &media.content {
                        if let Some(url) = &content.url {
                            media_urls.push(url.to_string());
                        }
                    }
                    for thumbnail in &media.thumbnails {
                        media_urls.push(thumbnail.image.uri.clone());
                    }
                }

                Some(FeedEntry {
                    guid,
                    link,
                    title: entry
                        .title
                        .map(|t| t.content.trim().to_string())
                        .unwrap_or_else(|| "(Sans titre)".to_string()),
                    summary_html,
                    media_urls,
                    published: entry.published.or(entry.updated),
                })
            })
            .collect();

        Ok(FetchedFeed { source, entries })
    }

    /// Fetch an article page. Non-200 responses are errors so the caller can
    /// fall back to the feed summary.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "Failed to fetch page {}: HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    /// Download raw bytes (image candidates).
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}
