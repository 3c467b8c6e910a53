use anyhow::{bail, Result};
use async_trait::async_trait;
use persona_llm::Tool;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AgentTool;
use crate::telegram::{TelegramClient, TelegramConfig, TelegramError};

pub const SEND_LEAD_TOOL: &str = "send_lead_to_telegram";

/// Contact details of a visitor who wants a meeting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub date: String,
    pub time_slot_ist: String,
}

impl Lead {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("name", &self.name),
            ("email", &self.email),
            ("subject", &self.subject),
            ("date", &self.date),
            ("time_slot_ist", &self.time_slot_ist),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                bail!("{} must not be empty", field);
            }
        }
        if !looks_like_email(self.email.trim()) {
            bail!("'{}' is not a valid email address", self.email.trim());
        }
        Ok(())
    }

    /// Notification text, escaped for `parse_mode=HTML`.
    pub fn to_telegram_html(&self) -> String {
        format!(
            "🆕 <b>New Lead from Website!</b>\n\n\
             👤 Name: {}\n\
             📧 Email: {}\n\
             📝 Subject: {}\n\
             📅 Preferred Date: {}\n\
             🕐 Preferred Time (IST): {}\n\n\
             ---\n\
             Please reach out to them soon!",
            escape_html(self.name.trim()),
            escape_html(self.email.trim()),
            escape_html(self.subject.trim()),
            escape_html(self.date.trim()),
            escape_html(self.time_slot_ist.trim()),
        )
    }
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sends collected leads to the owner's Telegram chat.
pub struct SendLeadTool {
    target: Option<(TelegramClient, String)>,
}

impl SendLeadTool {
    /// Without a bot token and chat id the tool stays registered but every
    /// call reports the missing credentials.
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let target = match (&config.bot_token, &config.chat_id) {
            (Some(token), Some(chat_id)) => {
                let mut client = TelegramClient::new(token.clone())?;
                if let Some(base) = &config.api_base {
                    client = client.with_api_base(base.clone());
                }
                Some((client, chat_id.clone()))
            }
            _ => {
                warn!("Telegram credentials missing; lead notifications are disabled");
                None
            }
        };
        Ok(Self { target })
    }

    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }
}

#[async_trait]
impl AgentTool for SendLeadTool {
    fn name(&self) -> &str {
        SEND_LEAD_TOOL
    }

    fn definition(&self) -> Tool {
        let field = |description: &str| json!({ "type": "string", "description": description });
        Tool::new(
            SEND_LEAD_TOOL,
            "Send lead information to Telegram once the visitor has given their name, \
             email, subject, preferred date and preferred time slot in IST.",
            json!({
                "type": "object",
                "properties": {
                    "name": field("The name of the lead"),
                    "email": field("The email address of the lead"),
                    "subject": field("What the lead wants to discuss"),
                    "date": field("The preferred date for the meeting"),
                    "time_slot_ist": field("The preferred time slot in IST (Indian Standard Time)"),
                },
                "required": ["name", "email", "subject", "date", "time_slot_ist"],
                "additionalProperties": false
            }),
        )
        .strict(true)
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let (client, chat_id) = self.target.as_ref().ok_or(TelegramError::NotConfigured)?;

        let lead: Lead = serde_json::from_value(arguments)?;
        lead.validate()?;

        client
            .send_message(chat_id, &lead.to_telegram_html(), Some("HTML"))
            .await?;

        info!(lead = %lead.name.trim(), "Lead sent to Telegram");
        Ok(format!(
            "Successfully sent lead information for {} to Telegram! I'll make sure to reach out to you soon.",
            lead.name.trim()
        ))
    }
}
