// OpenAI chat-completions client

use crate::config::OpenAIConfig;
use crate::streaming::parse_chat_sse_stream;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::{Content, Message, ToolCall};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// OpenAI client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(OpenAIConfig::new(api_key))
    }

    pub fn from_config(config: OpenAIConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .context("Invalid API key format")?,
        );
        if let Some(org) = &config.organization {
            headers.insert(
                "OpenAI-Organization",
                HeaderValue::from_str(org).context("Invalid organization header")?,
            );
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// o-series and gpt-5 models reject `temperature` and expect
    /// `max_completion_tokens`.
    fn is_reasoning_model(model: &str) -> bool {
        model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4") || model.starts_with("gpt-5")
    }

    fn build_chat_request(
        &self,
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Result<Value> {
        let openai_messages: Vec<Value> = messages
            .into_iter()
            .map(|msg| self.convert_message(msg))
            .collect::<Result<Vec<_>>>()?;

        let mut obj = Map::new();
        obj.insert("model".to_string(), json!(model));
        obj.insert("messages".to_string(), Value::Array(openai_messages));
        obj.insert("stream".to_string(), json!(stream));

        if stream {
            obj.insert("stream_options".to_string(), json!({ "include_usage": true }));
        }

        let is_reasoning_model = Self::is_reasoning_model(model);

        if let Some(temp) = options.temperature {
            if !is_reasoning_model {
                obj.insert("temperature".to_string(), json!(temp));
            }
        }
        if let Some(max_tokens) = options.max_tokens {
            let token_field = if is_reasoning_model {
                "max_completion_tokens"
            } else {
                "max_tokens"
            };
            obj.insert(token_field.to_string(), json!(max_tokens));
        }
        if let Some(tools) = &options.tools {
            obj.insert("tools".to_string(), serde_json::to_value(tools)?);
            if let Some(tool_choice) = &options.tool_choice {
                obj.insert("tool_choice".to_string(), serde_json::to_value(tool_choice)?);
            }
        }

        Ok(Value::Object(obj))
    }

    fn convert_message(&self, message: Message) -> Result<Value> {
        let mut obj = Map::new();
        obj.insert("role".to_string(), json!(message.role()));

        match message {
            Message::System { content, name } | Message::Human { content, name } => {
                obj.insert("content".to_string(), self.convert_content(content));
                if let Some(name) = name {
                    obj.insert("name".to_string(), json!(name));
                }
            }
            Message::AI { content, tool_calls, name } => {
                // The API requires the key even when the turn is tool calls only
                let content = content.map(|c| self.convert_content(c)).unwrap_or(Value::Null);
                obj.insert("content".to_string(), content);

                if let Some(tool_calls) = tool_calls {
                    obj.insert("tool_calls".to_string(), serde_json::to_value(tool_calls)?);
                }
                if let Some(name) = name {
                    obj.insert("name".to_string(), json!(name));
                }
            }
            Message::Tool { tool_call_id, content } => {
                obj.insert("tool_call_id".to_string(), json!(tool_call_id));
                obj.insert("content".to_string(), self.convert_content(content));
            }
        }

        Ok(Value::Object(obj))
    }

    fn convert_content(&self, content: Content) -> Value {
        match content {
            Content::Text(s) => json!(s),
            Content::Parts(parts) => json!(parts),
        }
    }

    async fn post_chat(&self, payload: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, "sending chat completion request");

        let response = self
            .http_client
            .post(url)
            .json(payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload =
            self.build_chat_request(&request.model, request.messages, &request.options, false)?;

        let raw: OpenAIChatResponse = self
            .post_chat(&payload)
            .await?
            .json()
            .await
            .context("Failed to parse response")?;

        let choice = raw.choices.first();
        Ok(ChatResponse {
            content: choice.and_then(|c| c.message.content.clone()),
            tool_calls: choice.and_then(|c| c.message.tool_calls.clone()),
            usage: raw.usage.as_ref().map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.and_then(|c| c.finish_reason.clone()),
            raw: serde_json::to_value(&raw)?,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload =
            self.build_chat_request(&request.model, request.messages, &request.options, true)?;

        let response = self.post_chat(&payload).await?;
        Ok(parse_chat_sse_stream(response))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIChatResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Tool, ToolChoice};

    fn client() -> OpenAIClient {
        OpenAIClient::new("test-key").unwrap()
    }

    #[test]
    fn test_reasoning_model_parameters() {
        let options = ChatOptions::new().temperature(0.2).max_tokens(256);
        let payload = client()
            .build_chat_request("o1-mini", vec![Message::human("hi")], &options, false)
            .unwrap();

        assert!(payload.get("temperature").is_none());
        assert_eq!(payload["max_completion_tokens"], 256);
        assert!(payload.get("max_tokens").is_none());
    }

    #[test]
    fn test_chat_model_parameters() {
        let options = ChatOptions::new().temperature(0.5).max_tokens(128);
        let payload = client()
            .build_chat_request("gpt-4o", vec![Message::human("hi")], &options, true)
            .unwrap();

        assert_eq!(payload["temperature"], 0.5);
        assert_eq!(payload["max_tokens"], 128);
        assert_eq!(payload["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_tool_choice_only_sent_with_tools() {
        let options = ChatOptions::new().tool_choice(ToolChoice::auto());
        let payload = client()
            .build_chat_request("gpt-4o", vec![Message::human("hi")], &options, false)
            .unwrap();
        assert!(payload.get("tool_choice").is_none());

        let options = options.tools(vec![Tool::new("t", "d", json!({"type": "object"}))]);
        let payload = client()
            .build_chat_request("gpt-4o", vec![Message::human("hi")], &options, false)
            .unwrap();
        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(payload["tools"][0]["function"]["name"], "t");
    }

    #[test]
    fn test_tool_only_assistant_turn_has_null_content() {
        let msg = Message::ai_with_tools(vec![ToolCall::function("call_1", "t", "{}")]);
        let value = client().convert_message(msg).unwrap();

        assert_eq!(value["role"], "assistant");
        assert!(value["content"].is_null());
        assert_eq!(value["tool_calls"][0]["id"], "call_1");
    }

    #[test]
    fn test_tool_result_message() {
        let value = client()
            .convert_message(Message::tool_result("call_1", "done"))
            .unwrap();
        assert_eq!(value, json!({"role": "tool", "tool_call_id": "call_1", "content": "done"}));
    }
}
