use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use sha1::{Digest, Sha1};
use url::Url;

use crate::error::{AppError, Result};

/// Below this we assume an icon, sprite or logo rather than a hero image.
pub const MIN_WIDTH: u32 = 300;
pub const MIN_HEIGHT: u32 = 160;

/// Gather candidate image URLs for an article, in decreasing order of
/// confidence: feed media fields, summary markup, page meta tags, JSON-LD,
/// the article container, and finally anything on the page. Relative URLs
/// are resolved against the page URL; duplicates keep their first position.
pub fn collect_image_candidates(
    page_html: Option<&str>,
    page_url: &str,
    summary_html: Option<&str>,
    media_urls: &[String],
    content_selector: Option<&str>,
) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    for url in media_urls {
        push_candidate(&mut candidates, url, page_url);
    }

    if let Some(html) = summary_html {
        let fragment = Html::parse_fragment(html);
        let img = Selector::parse("img[src]").unwrap();
        for element in fragment.select(&img) {
            if let Some(src) = element.value().attr("src") {
                push_candidate(&mut candidates, src, page_url);
            }
        }
    }

    if let Some(html) = page_html {
        let document = Html::parse_document(html);

        let metas = [
            "meta[property=\"og:image\"]",
            "meta[name=\"og:image\"]",
            "meta[name=\"twitter:image\"]",
            "meta[property=\"twitter:image\"]",
        ];
        for sel in metas {
            let selector = Selector::parse(sel).unwrap();
            for element in document.select(&selector) {
                if let Some(content) = element.value().attr("content") {
                    push_candidate(&mut candidates, content, page_url);
                }
            }
        }

        let ld = Selector::parse("script[type=\"application/ld+json\"]").unwrap();
        for element in document.select(&ld) {
            let raw = element.text().collect::<String>();
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                for url in json_ld_images(&value) {
                    push_candidate(&mut candidates, &url, page_url);
                }
            }
        }

        let img = Selector::parse("img[src]").unwrap();
        if let Some(sel) = content_selector.or(Some("article")) {
            if let Ok(container) = Selector::parse(sel) {
                for scope in document.select(&container) {
                    for element in scope.select(&img) {
                        if let Some(src) = element.value().attr("src") {
                            push_candidate(&mut candidates, src, page_url);
                        }
                    }
                }
            }
        }

        for element in document.select(&img) {
            if let Some(src) = element.value().attr("src") {
                push_candidate(&mut candidates, src, page_url);
            }
        }
    }

    candidates
}

fn push_candidate(candidates: &mut Vec<String>, raw: &str, page_url: &str) {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return;
    }
    let resolved = resolve_url(raw, page_url);
    if !resolved.starts_with("http") {
        return;
    }
    if !candidates.contains(&resolved) {
        candidates.push(resolved);
    }
}

fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Ok(base) = Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }
    href.to_string()
}

/// Pull image URLs out of a JSON-LD document. Handles the common shapes:
/// a string, an array, an ImageObject, and documents nested under @graph.
fn json_ld_images(value: &serde_json::Value) -> Vec<String> {
    let mut urls = Vec::new();
    collect_json_ld(value, &mut urls);
    urls
}

fn collect_json_ld(value: &serde_json::Value, urls: &mut Vec<String>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                collect_json_ld(item, urls);
            }
        }
        serde_json::Value::Object(map) => {
            if let Some(image) = map.get("image") {
                image_field(image, urls);
            }
            if let Some(graph) = map.get("@graph") {
                collect_json_ld(graph, urls);
            }
        }
        _ => {}
    }
}

fn image_field(value: &serde_json::Value, urls: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => urls.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                image_field(item, urls);
            }
        }
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(s)) = map.get("url") {
                urls.push(s.clone());
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub sha1: String,
    /// Public path, e.g. `/media/<sha1>.jpg`.
    pub url_path: String,
    pub width: u32,
    pub height: u32,
}

/// Downloads land here, one file per distinct content hash.
pub struct ImageStore {
    media_dir: PathBuf,
}

impl ImageStore {
    pub fn new(media_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(media_dir)?;
        Ok(Self {
            media_dir: media_dir.to_path_buf(),
        })
    }

    /// Decode, size-check, and persist image bytes keyed by content hash.
    /// Identical bytes always map to the same file.
    pub fn validate_and_store(&self, bytes: &[u8]) -> Result<StoredImage> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| AppError::Image(format!("not a decodable image: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        if width < MIN_WIDTH || height < MIN_HEIGHT {
            return Err(AppError::Image(format!(
                "image too small: {}x{} (minimum {}x{})",
                width, height, MIN_WIDTH, MIN_HEIGHT
            )));
        }

        let ext = image::guess_format(bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("img");

        let sha1 = hex::encode(Sha1::digest(bytes));
        let file_name = format!("{}.{}", sha1, ext);
        let path = self.media_dir.join(&file_name);
        if !path.exists() {
            std::fs::write(&path, bytes)?;
        }

        Ok(StoredImage {
            sha1,
            url_path: format!("/media/{}", file_name),
            width,
            height,
        })
    }
}
