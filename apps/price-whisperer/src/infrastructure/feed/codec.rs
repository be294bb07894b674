//! Tick Feed Codec
//!
//! JSON encoding for the tick feed protocol.
//!
//! # Inbound
//!
//! The feed sends either a single object or an array of objects:
//!
//! ```json
//! {"price":{"amount":"3456.78","currency":"USD"},"timestamp":"2024-05-01T12:00:00Z"}
//! [{"price":{"amount":"3456.78"}},{"price":{"amount":"3457.01"}}]
//! {"error":"unknown token"}
//! ```
//!
//! Objects with neither `price` nor `error` (acks, status) are ignored.
//!
//! # Outbound
//!
//! ```json
//! {"action":"subscribe","chain":"ethereum","token_address":"0x..."}
//! ```

use serde::Serialize;

use crate::application::ports::{FeedError, RawTick};
use crate::domain::pricing::Instrument;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

impl From<CodecError> for FeedError {
    fn from(e: CodecError) -> Self {
        Self::Decode(e.to_string())
    }
}

/// A decoded feed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// A price tick.
    Tick(RawTick),
    /// The feed reported an error.
    Error(String),
    /// Anything else (acknowledgements, status).
    Other,
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    action: &'static str,
    chain: &'a str,
    token_address: &'a str,
}

/// JSON codec for the tick feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickCodec;

impl TickCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode the subscribe request for an instrument.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_subscribe(&self, instrument: &Instrument) -> Result<String, CodecError> {
        let request = SubscribeRequest {
            action: "subscribe",
            chain: &instrument.chain,
            token_address: &instrument.token_address,
        };
        Ok(serde_json::to_string(&request)?)
    }

    /// Decode a text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object or array, or a tick
    /// object does not have the expected shape.
    pub fn decode(&self, text: &str) -> Result<Vec<FeedMessage>, CodecError> {
        let trimmed = text.trim();

        if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )));
        }

        match serde_json::from_str::<serde_json::Value>(trimmed)? {
            serde_json::Value::Array(values) => values.into_iter().map(decode_value).collect(),
            value => Ok(vec![decode_value(value)?]),
        }
    }
}

fn decode_value(value: serde_json::Value) -> Result<FeedMessage, CodecError> {
    if !value.is_object() {
        return Err(CodecError::InvalidFormat(format!(
            "expected message object, got: {value}"
        )));
    }

    if value.get("price").is_some() {
        return Ok(FeedMessage::Tick(serde_json::from_value(value)?));
    }

    match value.get("error") {
        Some(serde_json::Value::String(message)) => Ok(FeedMessage::Error(message.clone())),
        Some(error) => Ok(FeedMessage::Error(
            error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| error.to_string(), str::to_string),
        )),
        None => Ok(FeedMessage::Other),
    }
}
