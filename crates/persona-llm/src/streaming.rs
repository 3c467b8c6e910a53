use anyhow::Result;
use futures::StreamExt;
use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::traits::{EventStream, TokenUsage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Message {
        content: String,
    },

    /// Fragment of a tool call; fragments sharing `index` belong together
    ToolCall {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    Usage {
        input_tokens: u32,
        output_tokens: u32,
        total_tokens: u32,
    },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

impl From<TokenUsage> for StreamEvent {
    fn from(usage: TokenUsage) -> Self {
        Self::Usage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<ChunkUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub tool_type: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatStreamChunk {
    fn to_stream_events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = self.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::Message {
                        content: content.clone(),
                    });
                }
            }

            if let Some(tool_calls) = &choice.delta.tool_calls {
                for tc in tool_calls {
                    events.push(StreamEvent::ToolCall {
                        index: tc.index,
                        id: tc.id.clone(),
                        name: tc.function.as_ref().and_then(|f| f.name.clone()),
                        arguments: tc.function.as_ref().and_then(|f| f.arguments.clone()),
                    });
                }
            }

            if let Some(finish_reason) = &choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: Some(finish_reason.clone()),
                });
            }
        }

        // With include_usage the last chunk carries usage and no choices
        if let Some(usage) = &self.usage {
            events.push(StreamEvent::Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            });
        }

        events
    }
}

/// Incremental decoder for chat-completions server-sent events.
///
/// Bytes may arrive split at arbitrary points; only complete lines are
/// decoded. After the `[DONE]` marker every further byte is ignored.
#[derive(Debug, Default)]
pub struct ChatSseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl ChatSseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent>> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.decode_line(&line_bytes, &mut out);
            if self.finished {
                break;
            }
        }

        out
    }

    /// Decode a trailing line left without a newline when the body ended.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent>> {
        let mut out = Vec::new();
        if self.finished || self.buffer.is_empty() {
            return out;
        }
        let line_bytes = std::mem::take(&mut self.buffer);
        self.decode_line(&line_bytes, &mut out);
        self.finished = true;
        out
    }

    fn decode_line(&mut self, line_bytes: &[u8], out: &mut Vec<Result<StreamEvent>>) {
        let line = match std::str::from_utf8(line_bytes) {
            Ok(line) => line.trim(),
            Err(e) => {
                out.push(Err(anyhow::anyhow!("Invalid UTF-8 in stream: {}", e)));
                return;
            }
        };

        let Some(data) = line.strip_prefix("data:") else {
            // Comments, event names and blank separators carry nothing for us
            return;
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.finished = true;
            self.buffer.clear();
            return;
        }

        match serde_json::from_str::<ChatStreamChunk>(data) {
            Ok(chunk) => out.extend(chunk.to_stream_events().into_iter().map(Ok)),
            Err(e) => out.push(Err(anyhow::anyhow!("Failed to parse chat chunk: {}", e))),
        }
    }
}

pub fn parse_chat_sse_stream(response: Response) -> EventStream {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut decoder = ChatSseDecoder::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        yield event;
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(e) => {
                    yield Err(anyhow::anyhow!("Stream error: {}", e));
                    return;
                }
            }
        }

        for event in decoder.finish() {
            yield event;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(decoder: &mut ChatSseDecoder, input: &str) -> Vec<StreamEvent> {
        decoder
            .push(input.as_bytes())
            .into_iter()
            .map(|e| e.unwrap())
            .collect()
    }

    #[test]
    fn test_decodes_content_split_across_pushes() {
        let mut decoder = ChatSseDecoder::new();
        let line = "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n";
        let (a, b) = line.split_at(20);

        assert!(events(&mut decoder, a).is_empty());
        assert_eq!(
            events(&mut decoder, b),
            vec![StreamEvent::Message { content: "Hi".to_string() }]
        );
    }

    #[test]
    fn test_done_marker_stops_decoding() {
        let mut decoder = ChatSseDecoder::new();
        let out = events(
            &mut decoder,
            "data: [DONE]\n\ndata: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"late\"},\"finish_reason\":null}]}\n",
        );
        assert!(out.is_empty());
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_tool_call_and_usage_chunks() {
        let mut decoder = ChatSseDecoder::new();
        let input = concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"type\":\"function\",\"function\":{\"name\":\"lookup\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5,\"total_tokens\":15}}\n",
        );

        let out = events(&mut decoder, input);
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[0], StreamEvent::ToolCall { id: Some(id), .. } if id == "call_1"));
        assert_eq!(
            out[1],
            StreamEvent::Done { finish_reason: Some("tool_calls".to_string()) }
        );
        assert_eq!(
            out[2],
            StreamEvent::Usage { input_tokens: 10, output_tokens: 5, total_tokens: 15 }
        );
    }

    #[test]
    fn test_malformed_chunk_yields_error() {
        let mut decoder = ChatSseDecoder::new();
        let out = decoder.push(b"data: {not json}\n");
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[test]
    fn test_finish_decodes_unterminated_last_line() {
        let mut decoder = ChatSseDecoder::new();
        let tail = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"bye\"},\"finish_reason\":\"stop\"}]}";

        assert!(events(&mut decoder, tail).is_empty());

        let out: Vec<StreamEvent> = decoder.finish().into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            out,
            vec![
                StreamEvent::Message { content: "bye".to_string() },
                StreamEvent::Done { finish_reason: Some("stop".to_string()) },
            ]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_finish_after_done_yields_nothing() {
        let mut decoder = ChatSseDecoder::new();
        events(&mut decoder, "data: [DONE]\n");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_ignores_comments_and_event_lines() {
        let mut decoder = ChatSseDecoder::new();
        assert!(events(&mut decoder, ": keep-alive\nevent: ping\n\n").is_empty());
    }
}
