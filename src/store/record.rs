//! Log entry schema and batch normalization
//!
//! A [`ConversationBatch`] is the validated form of a save request. Turning it
//! into [`LogEntry`] values is a pure transformation: nothing here touches the
//! filesystem.

use crate::error::{ConvlogError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open string-keyed metadata attached to every entry of a batch
pub type Metadata = Map<String, Value>;

const SESSION_SUFFIX_LEN: usize = 9;
const SESSION_SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Speaker of a logged message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the end user
    User,
    /// Message produced by the assistant
    Assistant,
}

impl Role {
    /// Parse a wire role name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted conversation record
///
/// Serialized as a single JSON object per line. Field order matches the
/// on-disk format: `timestamp`, `session_id`, `user_id`, `role`, `message`,
/// `tokens`, `latency_ms`, `model`, `metadata`.
///
/// # Examples
///
/// ```
/// use convlog::store::{LogEntry, Role};
///
/// let line = r#"{"timestamp":"2025-01-01T00:00:00.000Z","session_id":"s1","user_id":null,
///     "role":"user","message":"hi there","tokens":2,"latency_ms":null,"model":null,"metadata":{}}"#;
/// let entry: LogEntry = serde_json::from_str(line).unwrap();
/// assert_eq!(entry.role, Role::User);
/// assert_eq!(entry.tokens, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO-8601 UTC timestamp with millisecond precision
    pub timestamp: String,
    /// Conversation grouping key
    pub session_id: String,
    /// Optional end-user identifier
    #[serde(default)]
    pub user_id: Option<String>,
    /// Who wrote the message
    pub role: Role,
    /// Message content
    pub message: String,
    /// Approximate length: count of whitespace-separated segments
    #[serde(default)]
    pub tokens: u64,
    /// Reserved; always null when written by this crate
    #[serde(default)]
    pub latency_ms: Option<f64>,
    /// Model name, copied from `metadata.model`
    #[serde(default)]
    pub model: Option<String>,
    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// A single `{role, content}` pair from a save request
#[derive(Debug, Clone, PartialEq)]
pub struct MessageInput {
    /// Speaker
    pub role: Role,
    /// Message content
    pub content: String,
}

/// Validated save request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationBatch {
    /// Messages in submission order
    pub messages: Vec<MessageInput>,
    /// Session id to append to; one is generated when absent
    pub session_id: Option<String>,
    /// Optional end-user identifier
    pub user_id: Option<String>,
    /// Metadata copied onto every entry
    pub metadata: Metadata,
}

impl ConversationBatch {
    /// Validate tool arguments into a batch
    ///
    /// # Errors
    ///
    /// Returns [`ConvlogError::Validation`] if `messages` is missing or not an
    /// array, if any message is not an object with a `user`/`assistant` role
    /// and string content, or if an optional field has the wrong type.
    pub fn from_value(args: &Value) -> Result<Self> {
        let obj = args
            .as_object()
            .ok_or_else(|| invalid("arguments must be an object"))?;

        let messages = match obj.get("messages") {
            None | Some(Value::Null) => return Err(invalid("messages is required")),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| parse_message(index, item))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(invalid("messages must be an array")),
        };

        let session_id = optional_string(obj, "session_id")?;
        let user_id = optional_string(obj, "user_id")?;
        let metadata = match obj.get("metadata") {
            None | Some(Value::Null) => Metadata::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(invalid("metadata must be an object")),
        };

        Ok(Self {
            messages,
            session_id,
            user_id,
            metadata,
        })
    }

    /// Session id this batch will be written under, generating one if needed
    pub fn resolve_session_id(&mut self) -> String {
        self.session_id
            .get_or_insert_with(generate_session_id)
            .clone()
    }

    /// Turn the batch into log entries stamped relative to `now`
    ///
    /// Message `i` is stamped `now + i` milliseconds so entries from one call
    /// keep submission order even when the clock is coarse.
    pub fn into_entries(mut self, now: DateTime<Utc>) -> Vec<LogEntry> {
        let session_id = self.resolve_session_id();
        let model = self
            .metadata
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.messages
            .into_iter()
            .enumerate()
            .map(|(index, msg)| LogEntry {
                timestamp: format_timestamp(now + Duration::milliseconds(index as i64)),
                session_id: session_id.clone(),
                user_id: self.user_id.clone(),
                role: msg.role,
                tokens: approximate_tokens(&msg.content),
                message: msg.content,
                latency_ms: None,
                model: model.clone(),
                metadata: self.metadata.clone(),
            })
            .collect()
    }
}

fn parse_message(index: usize, item: &Value) -> Result<MessageInput> {
    let obj = item
        .as_object()
        .ok_or_else(|| invalid(format!("messages[{}] must be an object", index)))?;

    let role = match obj.get("role") {
        None | Some(Value::Null) => {
            return Err(invalid(format!("messages[{}] is missing role", index)))
        }
        Some(Value::String(role)) => Role::parse(role).ok_or_else(|| {
            invalid(format!(
                "messages[{}] has invalid role '{}': must be user or assistant",
                index, role
            ))
        })?,
        Some(_) => return Err(invalid(format!("messages[{}].role must be a string", index))),
    };

    let content = match obj.get("content") {
        None | Some(Value::Null) => {
            return Err(invalid(format!("messages[{}] is missing content", index)))
        }
        Some(Value::String(content)) => content.clone(),
        Some(_) => {
            return Err(invalid(format!(
                "messages[{}].content must be a string",
                index
            )))
        }
    };

    Ok(MessageInput { role, content })
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(format!("{} must be a string", key))),
    }
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    ConvlogError::Validation(message.into()).into()
}

/// Generate a session id of the form `session_<epoch-ms>_<suffix>`
///
/// The suffix is nine random lowercase alphanumerics. Unique in practice, not
/// cryptographically.
///
/// # Examples
///
/// ```
/// let id = convlog::store::generate_session_id();
/// assert!(id.starts_with("session_"));
/// assert_eq!(id.rsplit('_').next().unwrap().len(), 9);
/// ```
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SESSION_SUFFIX_CHARSET.len());
            SESSION_SUFFIX_CHARSET[idx] as char
        })
        .collect();
    format!("session_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Rough message length: the number of whitespace-separated segments
///
/// This is not a tokenizer count.
pub fn approximate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Format a timestamp the way entries store it: `2025-01-01T12:00:00.000Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
