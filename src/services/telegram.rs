//! Outbound provider seams: the chat provider (Telegram Bot API) and the
//! scannable-code generator. Both go through one reqwest client with a
//! construction-time timeout, so no outbound call can hang a dispatch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::services::notify::ScanPayload;

/// Markup dialect used for every outbound message body.
pub const MARKUP_HTML: &str = "HTML";

/// Transactional message delivery. Errors carry the provider's
/// human-readable description; the dispatcher records them verbatim.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn send_text(&self, address: &str, body: &str, dialect: &str) -> anyhow::Result<()>;
    async fn send_image(
        &self,
        address: &str,
        image: Vec<u8>,
        caption: &str,
        dialect: &str,
    ) -> anyhow::Result<()>;
}

/// Renders a payload into a scannable image. Deterministic: the same
/// payload always encodes the same logical content.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn encode(&self, payload: &ScanPayload) -> anyhow::Result<Vec<u8>>;
}

pub struct TelegramProvider {
    client: Client,
    token: String,
}

impl TelegramProvider {
    pub fn new(token: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, token })
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }
}

#[async_trait]
impl ChatProvider for TelegramProvider {
    async fn send_text(&self, address: &str, body: &str, dialect: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&json!({
                "chat_id": address,
                "text": body,
                "parse_mode": dialect,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("sendMessage {status}: {detail}");
        }
        Ok(())
    }

    async fn send_image(
        &self,
        address: &str,
        image: Vec<u8>,
        caption: &str,
        dialect: &str,
    ) -> anyhow::Result<()> {
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("code.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", address.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", dialect.to_string())
            .part("photo", part);

        let response = self
            .client
            .post(self.api_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("sendPhoto {status}: {detail}");
        }
        Ok(())
    }
}

/// Stand-in when no bot token is configured: every send fails with a clear
/// reason, which the dispatcher records like any other provider error.
pub struct DisabledProvider;

#[async_trait]
impl ChatProvider for DisabledProvider {
    async fn send_text(&self, _address: &str, _body: &str, _dialect: &str) -> anyhow::Result<()> {
        anyhow::bail!("messaging not configured")
    }

    async fn send_image(
        &self,
        _address: &str,
        _image: Vec<u8>,
        _caption: &str,
        _dialect: &str,
    ) -> anyhow::Result<()> {
        anyhow::bail!("messaging not configured")
    }
}

/// Fetches a QR PNG for the payload from an external renderer.
pub struct QrImageService {
    client: Client,
    base_url: String,
}

impl QrImageService {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl CodeGenerator for QrImageService {
    async fn encode(&self, payload: &ScanPayload) -> anyhow::Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("size", "300x300"), ("data", &payload.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("code generator returned {}", response.status());
        }
        Ok(response.bytes().await?.to_vec())
    }
}
