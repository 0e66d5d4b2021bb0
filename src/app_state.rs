use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::oneshot;

use crate::{
    assist::SearchAssist,
    config::AppConfig,
    storage::{LocalStore, SessionStore},
};
use crate::models::SitemapDocument;

/// Contexto compartido que reciben todos los handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub assist: SearchAssist,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn sitemap(&self) -> &Arc<RwLock<SitemapDocument>> {
        &self.assist.sitemap
    }

    pub fn store(&self) -> &Arc<Mutex<LocalStore>> {
        &self.assist.store
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub message: String,
    pub site_name: String,
    pub solutions: usize,
    pub forums: usize,
    pub ai_search_enabled: bool,
    pub demo_mode: bool,
}
