use std::path::PathBuf;

use clap::Parser;

use crate::error::{AppError, Result};

pub const APP_NAME: &str = "Arménie Console";

/// Feeds used when neither the FEEDS variable nor the settings table
/// provides any.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://www.armenpress.am/rss/",
    "https://www.civilnet.am/feed/",
    "https://armtimes.com/rss",
    "https://factor.am/feed",
];

pub const DEFAULT_SIGNATURE: &str = "— Arménie Info";

#[derive(Parser, Debug, Default)]
#[command(name = "armenie-console", about = "RSS importer and moderation console")]
pub struct Cli {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the SQLite database
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Directory for downloaded images
    #[arg(long)]
    pub media_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub admin_pass: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub feeds: Vec<String>,
    pub import_interval_min: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            db_path: PathBuf::from("site.db"),
            media_dir: PathBuf::from("media"),
            admin_pass: "armenie".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            feeds: DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
            import_interval_min: 30,
        }
    }
}

impl Config {
    /// Read configuration from the environment, then apply CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("BIND_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("invalid PORT: {}", port)))?;
        }
        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("MEDIA_DIR") {
            config.media_dir = PathBuf::from(dir);
        }
        if let Ok(pass) = std::env::var("ADMIN_PASS") {
            config.admin_pass = pass;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.openai_api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.openai_model = model;
        }
        if let Ok(feeds) = std::env::var("FEEDS") {
            let parsed: Vec<String> = serde_json::from_str(&feeds)
                .map_err(|e| AppError::Config(format!("FEEDS is not a JSON array: {}", e)))?;
            if !parsed.is_empty() {
                config.feeds = parsed;
            }
        }
        if let Ok(mins) = std::env::var("IMPORT_INTERVAL_MIN") {
            config.import_interval_min = mins
                .parse()
                .map_err(|_| AppError::Config(format!("invalid IMPORT_INTERVAL_MIN: {}", mins)))?;
        }

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(ref path) = cli.db_path {
            config.db_path = path.clone();
        }
        if let Some(ref dir) = cli.media_dir {
            config.media_dir = dir.clone();
        }

        Ok(config)
    }
}
