use std::sync::Arc;

use scraper::{Html, Selector};
use url::Url;

use crate::ai::{fallback_rewrite, looks_french, Rewriter, Rewritten};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::extract::{
    collect_image_candidates, extract_article_text, summary_text, ImageStore, StoredImage,
    MIN_BODY_CHARS,
};
use crate::feed::{FeedEntry, FeedFetcher};
use crate::models::{sign_body, EntryOutcome, ImportReport, NewPost, ScraperConfig, Settings};

/// Runs the import pipeline: fetch feeds, extract text and images, rewrite
/// into French, de-duplicate, persist drafts.
pub struct Importer {
    repo: Arc<Repository>,
    config: Config,
    fetcher: FeedFetcher,
    images: ImageStore,
    /// Pluggable "did the model actually produce French" check.
    lang_check: fn(&str) -> bool,
}

/// How the image step resolved for one entry.
enum ImageResolution {
    Stored(StoredImage),
    Fallback(String),
    None,
    Rejected,
}

impl Importer {
    pub fn new(repo: Arc<Repository>, config: Config) -> Result<Self> {
        let images = ImageStore::new(&config.media_dir)?;
        Ok(Self {
            repo,
            config,
            fetcher: FeedFetcher::new(),
            images,
            lang_check: looks_french,
        })
    }

    #[cfg(test)]
    fn with_lang_check(mut self, check: fn(&str) -> bool) -> Self {
        self.lang_check = check;
        self
    }

    /// One full import run over every configured feed and scraper source.
    pub async fn run(&self) -> Result<ImportReport> {
        let map = self.repo.get_settings_map().await?;
        let settings = Settings::from_map(&map, &self.config)?;
        let rewriter = settings
            .openai_api_key
            .as_ref()
            .map(|key| Rewriter::new(key.clone(), settings.openai_model.clone()));

        let mut report = ImportReport::default();

        for feed_url in &settings.feeds {
            let sub = self
                .import_feed(feed_url, &settings, rewriter.as_ref())
                .await?;
            report.merge(&sub);
        }

        for scraper in &settings.scrapers {
            let sub = self
                .run_scraper(scraper, &settings, rewriter.as_ref())
                .await?;
            report.merge(&sub);
        }

        tracing::info!("Import terminé: {}", report);
        Ok(report)
    }

    async fn import_feed(
        &self,
        feed_url: &str,
        settings: &Settings,
        rewriter: Option<&Rewriter>,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        match self.fetcher.fetch_feed(feed_url).await {
            Ok(feed) => {
                tracing::debug!("Fetched {} entries from {}", feed.entries.len(), feed_url);
                for entry in feed.entries {
                    let outcome = self
                        .process_entry(entry, &feed.source, settings, rewriter, None)
                        .await?;
                    report.record(&outcome);
                }
            }
            Err(e) => {
                tracing::warn!("Feed {} failed: {}", feed_url, e);
                report.feed_failed += 1;
            }
        }
        Ok(report)
    }

    async fn process_entry(
        &self,
        entry: FeedEntry,
        source: &str,
        settings: &Settings,
        rewriter: Option<&Rewriter>,
        scraper: Option<&ScraperConfig>,
    ) -> Result<EntryOutcome> {
        if entry.link.is_empty() {
            return Ok(EntryOutcome::FetchFailed("entry has no link".into()));
        }
        if self.repo.link_exists(&entry.link).await? || self.repo.link_exists(&entry.guid).await? {
            return Ok(EntryOutcome::DuplicateLink);
        }

        let page_html = match self.fetcher.fetch_page(&entry.link).await {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::debug!("Page fetch failed for {}: {}", entry.link, e);
                None
            }
        };

        let content_selector = scraper.and_then(|s| s.content_selector.as_deref());
        let text = page_html
            .as_deref()
            .and_then(|html| extract_article_text(html, content_selector))
            .or_else(|| entry.summary_html.as_deref().and_then(summary_text));

        let Some(text) = text else {
            // Nothing extractable at all; a page we could not even fetch
            // counts as a fetch failure, an empty one as a stub.
            return Ok(match page_html {
                Some(_) => EntryOutcome::TooShort,
                None => EntryOutcome::FetchFailed(format!("no content for {}", entry.link)),
            });
        };
        if !body_long_enough(&text) {
            return Ok(EntryOutcome::TooShort);
        }

        let image_selector = scraper.and_then(|s| s.image_selector.as_deref());
        let image = self
            .resolve_image(
                page_html.as_deref(),
                &entry,
                settings,
                image_selector.or(content_selector),
            )
            .await;
        let (image_url, image_sha1) = match image {
            ImageResolution::Stored(stored) => (Some(stored.url_path), Some(stored.sha1)),
            ImageResolution::Fallback(url) => (Some(url), None),
            ImageResolution::None => (None, None),
            ImageResolution::Rejected => return Ok(EntryOutcome::NoImage),
        };

        let title = resolve_title(
            &entry.title,
            page_html.as_deref(),
            scraper.and_then(|s| s.title_selector.as_deref()),
        );

        let (rewritten, lang_verified) = self.rewrite_french(rewriter, &title, &text).await;

        let post = NewPost {
            guid: entry.guid,
            orig_link: entry.link,
            title: rewritten.title,
            body: sign_body(&rewritten.body, &settings.signature),
            image_url,
            image_sha1,
            source: source.to_string(),
            lang_verified,
        };

        self.persist(post).await
    }

    /// Up to two rewrite attempts gated by the language check; fall back to
    /// the untranslated text when the API fails or is not configured. The
    /// second element says whether the output passed the check.
    async fn rewrite_french(
        &self,
        rewriter: Option<&Rewriter>,
        title: &str,
        text: &str,
    ) -> (Rewritten, bool) {
        let Some(rewriter) = rewriter else {
            return (fallback_rewrite(title, text), false);
        };

        let first = match rewriter.rewrite(title, text).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Rewrite failed for '{}': {}", title, e);
                return (fallback_rewrite(title, text), false);
            }
        };
        if (self.lang_check)(&first.body) {
            return (first, true);
        }

        tracing::debug!("First rewrite did not look French, retrying: {}", title);
        match rewriter.rewrite(title, text).await {
            Ok(second) if (self.lang_check)(&second.body) => (second, true),
            Ok(second) => (second, false),
            Err(e) => {
                tracing::warn!("Rewrite retry failed for '{}': {}", title, e);
                (first, false)
            }
        }
    }

    /// Try every candidate URL until one downloads and validates. Policy on
    /// total failure comes from the settings: fallback image when one is
    /// configured, rejection when require_image is set, otherwise no image.
    async fn resolve_image(
        &self,
        page_html: Option<&str>,
        entry: &FeedEntry,
        settings: &Settings,
        container_selector: Option<&str>,
    ) -> ImageResolution {
        let candidates = collect_image_candidates(
            page_html,
            &entry.link,
            entry.summary_html.as_deref(),
            &entry.media_urls,
            container_selector,
        );

        for candidate in candidates {
            let bytes = match self.fetcher.fetch_bytes(&candidate).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!("Image download failed {}: {}", candidate, e);
                    continue;
                }
            };
            match self.images.validate_and_store(&bytes) {
                Ok(stored) => return ImageResolution::Stored(stored),
                Err(e) => {
                    tracing::debug!("Image rejected {}: {}", candidate, e);
                }
            }
        }

        match (&settings.default_image, settings.require_image) {
            (Some(url), _) => ImageResolution::Fallback(url.clone()),
            (None, true) => ImageResolution::Rejected,
            (None, false) => ImageResolution::None,
        }
    }

    async fn run_scraper(
        &self,
        cfg: &ScraperConfig,
        settings: &Settings,
        rewriter: Option<&Rewriter>,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        let index_html = match self.fetcher.fetch_page(&cfg.index_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Scraper {} index failed: {}", cfg.name, e);
                report.feed_failed += 1;
                return Ok(report);
            }
        };

        let links = scrape_links(&index_html, &cfg.link_selector, &cfg.index_url);
        for link in links.into_iter().take(cfg.item_cap) {
            let entry = FeedEntry {
                guid: link.clone(),
                link,
                title: String::new(),
                summary_html: None,
                media_urls: Vec::new(),
                published: None,
            };
            let outcome = self
                .process_entry(entry, &cfg.name, settings, rewriter, Some(cfg))
                .await?;
            report.record(&outcome);
        }
        Ok(report)
    }

    /// Dedupe by link and by image hash, then insert. Both columns also
    /// carry UNIQUE constraints, so a racing duplicate surfaces as a
    /// constraint error and is counted as a duplicate rather than bubbling
    /// up.
    async fn persist(&self, post: NewPost) -> Result<EntryOutcome> {
        if self.repo.link_exists(&post.orig_link).await? {
            return Ok(EntryOutcome::DuplicateLink);
        }
        if let Some(sha1) = &post.image_sha1 {
            if self.repo.image_sha1_exists(sha1).await? {
                return Ok(EntryOutcome::DuplicateImage);
            }
        }
        let link = post.orig_link.clone();
        match self.repo.insert_post(post).await {
            Ok(id) => Ok(EntryOutcome::Imported(id)),
            Err(e) => {
                tracing::debug!("Insert raced for {}: {}", link, e);
                Ok(EntryOutcome::DuplicateLink)
            }
        }
    }
}

/// Extract article links from a scraped index page.
fn scrape_links(html: &str, link_selector: &str, base_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(link_selector) else {
        return Vec::new();
    };
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Ok(resolved) = base.join(href) {
                let resolved = resolved.to_string();
                if !links.contains(&resolved) {
                    links.push(resolved);
                }
            }
        }
    }
    links
}

fn body_long_enough(text: &str) -> bool {
    text.chars().count() >= MIN_BODY_CHARS
}

/// Pick the entry title: a configured scraper selector wins over everything,
/// then the feed-provided title, then the page `<title>` (which usually
/// carries a site-name suffix, hence last).
fn resolve_title(
    entry_title: &str,
    page_html: Option<&str>,
    title_selector: Option<&str>,
) -> String {
    if let Some(sel) = title_selector {
        if let Some(title) = page_html.and_then(|html| select_text(html, sel)) {
            return title;
        }
    }
    if entry_title.is_empty() || entry_title == "(Sans titre)" {
        if let Some(title) = page_html.and_then(page_title) {
            return title;
        }
    }
    entry_title.to_string()
}

/// Text of the first element matching the selector.
fn select_text(html: &str, selector: &str) -> Option<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return None;
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn page_title(html: &str) -> Option<String> {
    select_text(html, "title")
}
