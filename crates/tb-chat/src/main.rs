use std::io::{self, Write};
use std::path::Path;

use base64::Engine;
use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "tb-chat", about = "Interactive chat CLI for tutor-bridge")]
struct Args {
    #[arg(long, default_value = "http://localhost:3000")]
    api_base: String,
    /// Model id; the server default is used when omitted.
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value = "elementary")]
    grade_level: String,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Ask the model not to use extended reasoning.
    #[arg(long, default_value = "false")]
    no_reasoning: bool,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
struct AttachmentWire {
    id: String,
    name: String,
    #[serde(rename = "type")]
    mime_type: String,
    size: u64,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
struct TurnWire {
    id: String,
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    grade_level: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    enable_reasoning: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [TurnWire],
    config: ConfigWire<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogWire {
    models: Vec<ModelWire>,
    grade_levels: Vec<GradeLevelWire>,
}

#[derive(Debug, Deserialize)]
struct ModelWire {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GradeLevelWire {
    id: String,
    name: String,
    range: String,
}

#[derive(Debug, Default, Deserialize)]
struct StreamEvent {
    content: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

fn attachment_from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> Result<AttachmentWire, String> {
    let size = bytes.len() as u64;
    if size > MAX_ATTACHMENT_BYTES {
        return Err(format!(
            "{name} is {size} bytes; attachments must be at most 10MB"
        ));
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(AttachmentWire {
        id: Uuid::new_v4().to_string(),
        name: name.to_owned(),
        mime_type: mime_type.to_owned(),
        size,
        data: format!("data:{mime_type};base64,{encoded}"),
    })
}

fn load_attachment(path: &Path) -> Result<AttachmentWire, String> {
    let mime_type = mime_type_for(path).ok_or_else(|| {
        format!(
            "{} is not supported. Please attach images (JPEG, PNG, WebP, GIF) or PDF files.",
            path.display()
        )
    })?;

    let meta = std::fs::metadata(path).map_err(|e| format!("{}: {e}", path.display()))?;
    if meta.len() > MAX_ATTACHMENT_BYTES {
        return Err(format!("{} is larger than 10MB", path.display()));
    }

    let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment");
    attachment_from_bytes(name, mime_type, &bytes)
}

// ---------------------------------------------------------------------------
// Stream parsing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Frame {
    Content(String),
    Error(String),
    Done,
    Ignore,
}

fn parse_frame(line: &str) -> Frame {
    let Some(data) = line.strip_prefix("data: ") else {
        return Frame::Ignore;
    };
    if data == "[DONE]" {
        return Frame::Done;
    }
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(StreamEvent {
            error: Some(message),
            ..
        }) => Frame::Error(message),
        Ok(StreamEvent {
            content: Some(text),
            ..
        }) => Frame::Content(text),
        _ => Frame::Ignore,
    }
}

/// Accumulates response bytes and yields complete lines, decoding each line
/// only once its terminating newline has arrived.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(
            String::from_utf8_lossy(&raw[..pos])
                .trim_end_matches('\r')
                .to_owned(),
        )
    }
}

// ---------------------------------------------------------------------------
// Interactive loop
// ---------------------------------------------------------------------------

async fn describe_grade_level(client: &reqwest::Client, api_base: &str, args: &Args) {
    let catalog = match client.get(format!("{api_base}/api/catalog")).send().await {
        Ok(resp) if resp.status().is_success() => resp.json::<CatalogWire>().await.ok(),
        _ => None,
    };

    let Some(catalog) = catalog else {
        eprintln!("{}", "Warning: could not load the catalog from the server.".yellow());
        return;
    };

    match catalog.grade_levels.iter().find(|g| g.id == args.grade_level) {
        Some(g) => println!("Grade level: {} ({})", g.name.bold(), g.range),
        None => {
            let known: Vec<&str> = catalog.grade_levels.iter().map(|g| g.id.as_str()).collect();
            eprintln!(
                "{}",
                format!(
                    "Warning: unknown grade level {}; server knows {}",
                    args.grade_level,
                    known.join(", ")
                )
                .yellow()
            );
        }
    }

    if let Some(model) = &args.model {
        match catalog.models.iter().find(|m| &m.id == model) {
            Some(m) => println!("Model: {}", m.name.bold()),
            None => eprintln!("{}", format!("Warning: unknown model {model}").yellow()),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let api_base = args.api_base.trim_end_matches('/').to_owned();
    let endpoint = format!("{api_base}/api/chat");
    let client = reqwest::Client::new();
    let mut history: Vec<TurnWire> = Vec::new();
    let mut pending: Vec<AttachmentWire> = Vec::new();

    describe_grade_level(&client, &api_base, &args).await;
    println!("{}", "Commands: /attach <path>, /clear, quit".dimmed());

    loop {
        print!("{}", "You: ".bright_cyan());
        if let Err(err) = io::stdout().flush() {
            eprintln!("{}", format!("Failed to flush stdout: {err}").red());
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("{}", format!("Failed to read input: {err}").red());
                continue;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "quit" | "exit") {
            break;
        }
        if input == "/clear" {
            history.clear();
            pending.clear();
            println!("{}", "Conversation cleared.".dimmed());
            continue;
        }
        if let Some(path) = input.strip_prefix("/attach ") {
            match load_attachment(Path::new(path.trim())) {
                Ok(attachment) => {
                    println!(
                        "{}",
                        format!("Attached {} ({} bytes)", attachment.name, attachment.size).dimmed()
                    );
                    pending.push(attachment);
                }
                Err(message) => eprintln!("{}", message.red()),
            }
            continue;
        }

        history.push(TurnWire {
            id: Uuid::new_v4().to_string(),
            role: "user",
            content: input.to_owned(),
            attachments: std::mem::take(&mut pending),
        });

        let request = ChatRequest {
            messages: &history,
            config: ConfigWire {
                model: args.model.as_deref(),
                grade_level: &args.grade_level,
                temperature: args.temperature,
                max_tokens: args.max_tokens,
                enable_reasoning: !args.no_reasoning,
            },
        };

        let response = match client.post(&endpoint).json(&request).send().await {
            Ok(resp) => resp,
            Err(err) => {
                let _ = history.pop();
                eprintln!(
                    "{}",
                    format!("Connection error: {err}. Please check --api-base and server status.")
                        .red()
                );
                continue;
            }
        };

        if !response.status().is_success() {
            let _ = history.pop();
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|v| v.error)
                .unwrap_or(body);
            eprintln!("{}", format!("Request failed ({status}): {message}").red());
            continue;
        }

        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::default();
        let mut assistant_text = String::new();
        let mut printed_prefix = false;
        let mut done = false;

        while let Some(item) = stream.next().await {
            let bytes = match item {
                Ok(b) => b,
                Err(err) => {
                    eprintln!("{}", format!("\nStream error: {err}").red());
                    break;
                }
            };

            buffer.push(&bytes);

            while let Some(line) = buffer.next_line() {
                match parse_frame(&line) {
                    Frame::Content(text) => {
                        if !printed_prefix {
                            print!("{}", "Tutor: ".bright_green());
                            printed_prefix = true;
                        }
                        print!("{}", text.bright_green());
                        let _ = io::stdout().flush();
                        assistant_text.push_str(&text);
                    }
                    Frame::Error(message) => {
                        eprintln!("{}", format!("\n{message}").red());
                    }
                    Frame::Done => {
                        done = true;
                        break;
                    }
                    Frame::Ignore => {}
                }
            }

            if done {
                break;
            }
        }

        if printed_prefix {
            println!();
        } else {
            println!("{}", "Tutor: <empty response>".bright_green());
        }

        if !assistant_text.is_empty() {
            history.push(TurnWire {
                id: Uuid::new_v4().to_string(),
                role: "assistant",
                content: assistant_text,
                attachments: Vec::new(),
            });
        }
    }
}
