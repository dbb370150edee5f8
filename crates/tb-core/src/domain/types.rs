use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// String-based identity newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(TurnId);
string_newtype!(AttachmentId);
string_newtype!(ModelId);
string_newtype!(GradeLevelId);
string_newtype!(RequestId);

// ---------------------------------------------------------------------------
// Conversation turns
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A file attached to a user turn. `encoded_data` is a `data:` URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    #[serde(rename = "type", alias = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "size", alias = "sizeBytes", default)]
    pub size_bytes: u64,
    #[serde(rename = "data", alias = "encodedData")]
    pub encoded_data: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    /// An attachment is only sendable once its payload is fully present.
    pub fn is_materialized(&self) -> bool {
        !self.encoded_data.is_empty()
    }
}

/// One message of a conversation. The role is fixed when the turn is
/// created; content changes produce a new turn via [`ConversationTurn::with_content`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<TurnId>,
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            timestamp: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: TurnId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn id(&self) -> Option<&TurnId> {
        self.id.as_ref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn is_sendable(&self) -> bool {
        self.attachments.iter().all(Attachment::is_materialized)
    }
}

// ---------------------------------------------------------------------------
// Static profiles
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenCost {
    pub input: f64,
    pub output: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProfile {
    pub id: ModelId,
    #[serde(rename = "name")]
    pub display_name: String,
    pub provider: String,
    pub supports_reasoning: bool,
    #[serde(rename = "costPerMillion")]
    pub cost_per_million_tokens: TokenCost,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeLevelProfile {
    pub id: GradeLevelId,
    #[serde(rename = "name")]
    pub display_name: String,
    pub range: String,
    #[serde(rename = "promptFile")]
    pub prompt_resource_key: String,
}

// ---------------------------------------------------------------------------
// RequestConfig: resolved per-request generation settings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct RequestConfig {
    pub model: ModelProfile,
    pub grade_level: GradeLevelProfile,
    pub temperature: f64,
    pub max_tokens: u32,
    pub enable_reasoning: bool,
}

impl RequestConfig {
    /// Reasoning is only requested when the model supports it and the
    /// caller asked for it.
    pub fn reasoning_requested(&self) -> bool {
        self.model.supports_reasoning && self.enable_reasoning
    }
}

// ---------------------------------------------------------------------------
// ApiKey: secret value object with redacted Debug and constant-time PartialEq
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ApiKey {
    fn eq(&self, other: &Self) -> bool {
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        let max_len = a.len().max(b.len());
        let mut result = (a.len() != b.len()) as u8;
        for i in 0..max_len {
            let x = if i < a.len() { a[i] } else { 0 };
            let y = if i < b.len() { b[i] } else { 0 };
            result |= x ^ y;
        }
        result == 0
    }
}

impl Eq for ApiKey {}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        if prefix.chars().count() == 6 {
            write!(f, "ApiKey({prefix}...)")
        } else {
            write!(f, "ApiKey(***)")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
