use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medcamp_api::config::Config;
use medcamp_api::db;
use medcamp_api::middleware::auth::JwtSecret;
use medcamp_api::routes;
use medcamp_api::services::chat_link::ChatLinkService;
use medcamp_api::services::notify::NotificationDispatcher;
use medcamp_api::services::telegram::{
    ChatProvider, DisabledProvider, QrImageService, TelegramProvider,
};
use medcamp_api::store::pg::PgStore;
use medcamp_api::store::Store;
use medcamp_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let timeout = Duration::from_secs(config.provider_timeout_secs);
    let provider: Arc<dyn ChatProvider> = match &config.bot_token {
        Some(token) => {
            info!("Chat provider configured");
            Arc::new(TelegramProvider::new(token.clone(), timeout)?)
        }
        None => {
            info!("BOT_TOKEN not set — outbound messaging disabled");
            Arc::new(DisabledProvider)
        }
    };
    let codes = Arc::new(QrImageService::new(config.qr_service_url.clone(), timeout)?);

    let dispatcher = Arc::new(NotificationDispatcher::new(
        provider,
        codes,
        config.test_chat_id.clone(),
        timeout,
    ));
    let chat_link = Arc::new(ChatLinkService::new(dispatcher.clone()));

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let state = AppState {
        db: pool,
        store,
        config: config.clone(),
        dispatcher,
        chat_link,
    };

    // Allow the configured frontend origin plus localhost for development.
    let base_url = config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else { return false };
        o == base_url || o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1")
    });
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        // Public registration + provider webhook
        .route("/public/camps/{slug}/register", post(routes::visits::register_visitor))
        .route("/webhook/telegram", post(routes::webhook::telegram_update))
        // Camps + staff
        .route("/camps", get(routes::camps::list_camps).post(routes::camps::create_camp))
        .route(
            "/camps/{camp_id}",
            get(routes::camps::get_camp)
                .put(routes::camps::update_camp)
                .delete(routes::camps::delete_camp),
        )
        .route(
            "/camps/{camp_id}/staff",
            get(routes::camps::list_staff).post(routes::camps::create_staff),
        )
        // Visits
        .route("/camps/{camp_id}/visits", get(routes::visits::list_visits))
        .route("/camps/{camp_id}/visits/search", get(routes::visits::search_visits))
        .route("/camps/{camp_id}/scan", post(routes::visits::scan))
        .route(
            "/camps/{camp_id}/visits/{visit_id}/consultation",
            get(routes::visits::get_consultation).put(routes::visits::save_consultation),
        )
        // Attachments
        .route("/camps/{camp_id}/attachments", post(routes::attachments::create_attachment))
        .route(
            "/camps/{camp_id}/visits/{visit_id}/attachments",
            get(routes::attachments::list_attachments),
        )
        .route(
            "/camps/{camp_id}/attachments/{attachment_id}",
            delete(routes::attachments::delete_attachment),
        )
        // Notification log + manual sends
        .route("/camps/{camp_id}/notifications", get(routes::notifications::query_log))
        .route(
            "/camps/{camp_id}/visitors/{visitor_id}/notify",
            post(routes::notifications::notify_visitor),
        )
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("medcamp API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
