//! Minimal Telegram Bot API client for lead notifications.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram credentials not configured. Set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID")]
    NotConfigured,

    #[error("request to Telegram failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram returned HTTP {status}")]
    Status { status: u16 },

    #[error("Telegram rejected the message: {0}")]
    Api(String),
}

/// Bot credentials and the chat that receives notifications.
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: Option<String>,
}

impl TelegramConfig {
    /// Read `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`; blank values count as unset.
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            bot_token: read("TELEGRAM_BOT_TOKEN"),
            chat_id: read("TELEGRAM_CHAT_ID"),
            api_base: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            http,
            bot_token: bot_token.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Send `text` to `chat_id`; `parse_mode` is `HTML` or `MarkdownV2`.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), TelegramError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = json!(mode);
        }

        let response = self.http.post(&url).json(&payload).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "Telegram sendMessage responded");

        // Error responses carry `ok: false` and a description, even on 4xx.
        match serde_json::from_str::<TelegramResponse>(&body) {
            Ok(parsed) if parsed.ok && status.is_success() => Ok(()),
            Ok(parsed) if !parsed.ok => Err(TelegramError::Api(
                parsed.description.unwrap_or_else(|| "Unknown error".to_string()),
            )),
            _ => Err(TelegramError::Status {
                status: status.as_u16(),
            }),
        }
    }
}
