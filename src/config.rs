use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    pub host: String,
    pub port: u16,
    /// Telegram Bot API token; messaging is disabled when absent.
    pub bot_token: Option<String>,
    /// Fallback chat id for test-mode delivery when a visitor has no link.
    pub test_chat_id: Option<String>,
    /// Endpoint that renders a QR PNG for a payload passed as `?data=`.
    pub qr_service_url: String,
    /// Upper bound on any single outbound provider call.
    pub provider_timeout_secs: u64,
    pub app_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "3600".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            bot_token: env::var("BOT_TOKEN").ok().filter(|s| !s.is_empty()),
            test_chat_id: env::var("TEST_CHAT_ID").ok().filter(|s| !s.is_empty()),
            qr_service_url: env::var("QR_SERVICE_URL")
                .unwrap_or_else(|_| "https://api.qrserver.com/v1/create-qr-code/".into()),
            provider_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
