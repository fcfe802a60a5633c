use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::db::Repository;
use crate::importer::Importer;
use crate::models::ImportReport;

/// Everything the request handlers and background tasks share. Built once
/// at startup and passed explicitly; there is no global state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub importer: Arc<Importer>,
    pub last_report: Arc<Mutex<Option<ImportReport>>>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, importer: Arc<Importer>) -> Self {
        Self {
            repo,
            config,
            sessions: Arc::new(Mutex::new(SessionStore::default())),
            importer,
            last_report: Arc::new(Mutex::new(None)),
        }
    }
}
