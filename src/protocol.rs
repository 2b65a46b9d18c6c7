//! Wire protocol for the chat socket: JSON text frames discriminated by a
//! `"type"` field.
//!
//! Outbound frames are serialized with the discriminant first, matching the
//! documented wire shapes exactly. Inbound frames are decoded in two steps:
//! parse the JSON, then dispatch on the `"type"` string. Known types map to
//! typed [`InboundEvent`] variants; anything else is forwarded opaquely as
//! [`InboundEvent::Application`] so out-of-band server events reach the
//! caller without this layer understanding their schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Frame types this layer decodes into typed variants. Any other `"type"`
/// is delivered as [`InboundEvent::Application`].
const KNOWN_EVENT_TYPES: &[&str] = &[
    "user_message",
    "assistant_typing",
    "assistant_message_chunk",
    "assistant_message_complete",
    "error",
    "pong",
];

/// A frame that failed to decode. Malformed frames are logged and dropped
/// by the connection task; they never reach the caller and never tear down
/// the connection.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no string \"type\" discriminant")]
    MissingType,
}

// ── Outbound frames ─────────────────────────────────────────────────────────

/// Caller-issued frames, serialized as JSON text before transmission.
///
/// Sends are never queued: the socket must be open or the frame is dropped.
/// Raw passthrough payloads bypass this type entirely and go out verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Free-text chat message, optionally carrying an API-key reference.
    ChatMessage {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
    /// Keep-alive probe. The server answers with a `pong` event.
    Ping,
}

impl OutboundFrame {
    /// Serialize to the wire representation.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound events ──────────────────────────────────────────────────────────

/// Completed assistant response delivered with
/// [`InboundEvent::AssistantMessageComplete`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    /// Full response text, replacing any streamed chunks.
    pub content: String,
    /// Server-side generation time.
    pub timestamp: DateTime<Utc>,
    pub model_used: String,
    /// Generation latency reported by the server.
    pub response_time_ms: u64,
}

/// A parsed server-to-client frame, delivered verbatim and in arrival order
/// through the on-message callback.
///
/// Chunk events append to exactly one in-progress assistant message and a
/// complete event replaces it; that assembly is the caller's job. This
/// layer's only obligation is faithful, in-order delivery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Echo of the caller's own message. Delivered like any other event;
    /// callers that render optimistically will usually ignore it.
    UserMessage { message: Value },
    /// Typing indicator toggle.
    AssistantTyping { status: bool },
    /// Incremental fragment of the in-progress assistant response.
    AssistantMessageChunk { chunk: String },
    /// Final assistant response with metadata.
    AssistantMessageComplete { message: AssistantMessage },
    /// Server-reported error. The connection itself remains usable.
    Error { error: String },
    /// Answer to a keep-alive ping. Advisory only; a missing pong is not
    /// treated as a liveness failure.
    Pong,
    /// Application-specific out-of-band event, forwarded opaquely.
    /// `payload` carries the complete frame as received.
    #[serde(skip)]
    Application { event_type: String, payload: Value },
}

/// Decode one inbound text frame.
///
/// Known `"type"` values produce typed variants and fail loudly when their
/// required fields are missing or mistyped. Unknown types are wrapped as
/// [`InboundEvent::Application`] without further interpretation.
pub fn decode_event(raw: &str) -> Result<InboundEvent, ProtocolError> {
    let value: Value = serde_json::from_str(raw)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if KNOWN_EVENT_TYPES.contains(&kind.as_str()) {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(InboundEvent::Application {
            event_type: kind,
            payload: value,
        })
    }
}
