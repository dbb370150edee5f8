use std::future::Future;
use std::pin::Pin;

use futures_util::StreamExt;
use tb_core::domain::{
    ContentPart, DeltaStream, Message, MessageContent, UpstreamError, UpstreamModel,
    UpstreamRequest,
};

use crate::bootstrap::UpstreamSettings;
use crate::upstream::streaming::SseLineParser;

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenAI-compatible chat completions endpoint (OpenRouter by default).
pub struct OpenRouterUpstream {
    client: reqwest::Client,
    settings: UpstreamSettings,
}

impl OpenRouterUpstream {
    pub fn new(settings: UpstreamSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", "application/json".to_owned()),
            ("HTTP-Referer", self.settings.site_url.clone()),
            ("X-Title", self.settings.app_title.clone()),
        ]
    }
}

impl UpstreamModel for OpenRouterUpstream {
    fn open_stream<'a>(
        &'a self,
        request: &'a UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<DeltaStream, UpstreamError>> + Send + 'a>> {
        Box::pin(async move {
            let body = build_request_body(request)?;
            let url = format!("{}{CHAT_COMPLETIONS_PATH}", self.settings.base_url);

            let mut req_builder = self.client.post(&url).body(body);
            for (k, v) in self.extra_headers() {
                req_builder = req_builder.header(k, v);
            }
            if let Some(key) = &self.settings.api_key {
                req_builder = req_builder.bearer_auth(key.as_str());
            }

            let timeout = self.settings.request_timeout;
            let resp = tokio::time::timeout(timeout, req_builder.send())
                .await
                .map_err(|_| UpstreamError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })?
                .map_err(|e| UpstreamError::Connection(e.to_string()))?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(UpstreamError::HttpStatus { status, body });
            }

            let lines = SseLineParser::new(resp.bytes_stream());
            Ok(delta_stream(lines))
        })
    }
}

/// Turns parsed SSE lines into text deltas. Ends at `[DONE]`, at the end of
/// the body, or after yielding the first error.
fn delta_stream<S>(lines: S) -> DeltaStream
where
    S: futures_core::Stream<Item = Result<String, reqwest::Error>> + Send + Unpin + 'static,
{
    Box::pin(async_stream::stream! {
        let mut lines = lines;
        while let Some(line_result) = lines.next().await {
            let line = match line_result {
                Ok(l) => l,
                Err(e) => {
                    yield Err(UpstreamError::Connection(e.to_string()));
                    break;
                }
            };

            match parse_stream_line(&line) {
                Ok(StreamLine::Delta(text)) => {
                    yield Ok(text);
                }
                Ok(StreamLine::Skip) => continue,
                Ok(StreamLine::Done) => break,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

pub fn build_request_body(req: &UpstreamRequest) -> Result<Vec<u8>, UpstreamError> {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .map(|m: &Message| {
            serde_json::json!({
                "role": m.role.as_str(),
                "content": content_to_json(&m.content),
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": req.model.as_str(),
        "messages": messages,
        "temperature": req.temperature,
        "max_tokens": req.max_tokens,
        "stream": req.stream,
    });

    if let (Some(reasoning), Some(obj)) = (req.reasoning, body.as_object_mut()) {
        obj.insert(
            "reasoning".into(),
            serde_json::json!({
                "effort": reasoning.effort,
                "exclude": !reasoning.include_trace,
            }),
        );
        obj.insert(
            "include_reasoning".into(),
            serde_json::Value::Bool(reasoning.include_trace),
        );
    }

    serde_json::to_vec(&body).map_err(|e| UpstreamError::Encode(e.to_string()))
}

fn content_to_json(content: &MessageContent) -> serde_json::Value {
    match content {
        MessageContent::Text(t) => serde_json::Value::String(t.clone()),
        MessageContent::Parts(parts) => {
            let arr: Vec<serde_json::Value> = parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => serde_json::json!({"type": "text", "text": text}),
                    ContentPart::ImageUrl { image_url } => serde_json::json!({
                        "type": "image_url",
                        "image_url": {"url": image_url.url},
                    }),
                    ContentPart::File { file } => serde_json::json!({
                        "type": "file",
                        "file": {"filename": file.filename, "file_data": file.file_data},
                    }),
                })
                .collect();
            serde_json::Value::Array(arr)
        }
    }
}

// ---------------------------------------------------------------------------
// Stream line parsing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub enum StreamLine {
    Delta(String),
    Skip,
    Done,
}

pub fn parse_stream_line(line: &str) -> Result<StreamLine, UpstreamError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(StreamLine::Skip);
    }
    if trimmed == "[DONE]" {
        return Ok(StreamLine::Done);
    }

    let chunk: StreamChunkWire =
        serde_json::from_str(trimmed).map_err(|e| UpstreamError::Decode(e.to_string()))?;

    if let Some(err) = chunk.error {
        return Err(UpstreamError::Provider(err.message));
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    if content.is_empty() {
        Ok(StreamLine::Skip)
    } else {
        Ok(StreamLine::Delta(content))
    }
}

// ---------------------------------------------------------------------------
// Stream wire types (Deserialize only)
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct StreamChunkWire {
    #[serde(default)]
    choices: Vec<StreamChoiceWire>,
    error: Option<ProviderErrorWire>,
}

#[derive(serde::Deserialize)]
struct StreamChoiceWire {
    #[serde(default)]
    delta: DeltaWire,
}

#[derive(serde::Deserialize, Default)]
struct DeltaWire {
    content: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProviderErrorWire {
    message: String,
}
