use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{Config, DEFAULT_SIGNATURE};
use crate::error::{AppError, Result};

/// Settings table keys.
pub mod keys {
    pub const FEEDS: &str = "feeds";
    pub const OPENAI_API_KEY: &str = "openai_api_key";
    pub const OPENAI_MODEL: &str = "openai_model";
    pub const DEFAULT_IMAGE: &str = "default_image";
    pub const REQUIRE_IMAGE: &str = "require_image";
    pub const IMPORT_INTERVAL_MIN: &str = "import_interval_min";
    pub const SIGNATURE: &str = "signature";
    pub const SCRAPERS: &str = "scrapers";
}

/// A configured non-RSS source: an index page scraped with CSS selectors.
///
/// Validated at load time so a bad selector shows up when settings are
/// saved, not in the middle of an import run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScraperConfig {
    pub name: String,
    pub index_url: String,
    pub link_selector: String,
    #[serde(default)]
    pub title_selector: Option<String>,
    #[serde(default)]
    pub content_selector: Option<String>,
    #[serde(default)]
    pub image_selector: Option<String>,
    #[serde(default = "default_item_cap")]
    pub item_cap: usize,
}

fn default_item_cap() -> usize {
    10
}

impl ScraperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.index_url.is_empty() {
            return Err(AppError::BadRequest(
                "scraper: name et index_url sont requis".into(),
            ));
        }
        let selectors = [
            Some(&self.link_selector),
            self.title_selector.as_ref(),
            self.content_selector.as_ref(),
            self.image_selector.as_ref(),
        ];
        for sel in selectors.into_iter().flatten() {
            if scraper::Selector::parse(sel).is_err() {
                return Err(AppError::BadRequest(format!(
                    "scraper {}: sélecteur CSS invalide: {}",
                    self.name, sel
                )));
            }
        }
        Ok(())
    }
}

/// Runtime-editable settings. Rows in the settings table shadow the
/// environment defaults from [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub feeds: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub default_image: Option<String>,
    pub require_image: bool,
    pub import_interval_min: u64,
    pub signature: String,
    pub scrapers: Vec<ScraperConfig>,
}

impl Settings {
    pub fn from_map(map: &HashMap<String, String>, config: &Config) -> Result<Self> {
        let feeds = match map.get(keys::FEEDS) {
            Some(raw) => {
                let list: Vec<String> = raw
                    .lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect();
                if list.is_empty() {
                    config.feeds.clone()
                } else {
                    list
                }
            }
            None => config.feeds.clone(),
        };

        let openai_api_key = map
            .get(keys::OPENAI_API_KEY)
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| config.openai_api_key.clone());

        let openai_model = map
            .get(keys::OPENAI_MODEL)
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| config.openai_model.clone());

        let default_image = map
            .get(keys::DEFAULT_IMAGE)
            .filter(|v| !v.is_empty())
            .cloned();

        let require_image = map
            .get(keys::REQUIRE_IMAGE)
            .map(|v| v == "1" || v == "true")
            .unwrap_or(false);

        let import_interval_min = match map.get(keys::IMPORT_INTERVAL_MIN) {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::BadRequest(format!("intervalle d'import invalide: {}", raw))
            })?,
            None => config.import_interval_min,
        };

        let signature = map
            .get(keys::SIGNATURE)
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_SIGNATURE.to_string());

        let scrapers: Vec<ScraperConfig> = match map.get(keys::SCRAPERS) {
            Some(raw) if !raw.trim().is_empty() => {
                let parsed: Vec<ScraperConfig> = serde_json::from_str(raw).map_err(|e| {
                    AppError::BadRequest(format!("configuration scraper invalide: {}", e))
                })?;
                for scraper in &parsed {
                    scraper.validate()?;
                }
                parsed
            }
            _ => Vec::new(),
        };

        Ok(Settings {
            feeds,
            openai_api_key,
            openai_model,
            default_image,
            require_image,
            import_interval_min,
            signature,
            scrapers,
        })
    }

    pub fn feeds_text(&self) -> String {
        self.feeds.join("\n")
    }

    pub fn scrapers_json(&self) -> String {
        if self.scrapers.is_empty() {
            String::new()
        } else {
            serde_json::to_string_pretty(&self.scrapers).unwrap_or_default()
        }
    }
}
