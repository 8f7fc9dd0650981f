pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use services::chat_link::ChatLinkService;
use services::notify::NotificationDispatcher;
use store::Store;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub chat_link: Arc<ChatLinkService>,
}
