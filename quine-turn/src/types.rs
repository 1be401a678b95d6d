//! Wire-neutral request and response types.
//!
//! Providers translate between these and their dialect's JSON. The tape's
//! [`Message`] is the lingua franca; providers never see tape internals
//! beyond the message list.

use quine_tape::Message;
use serde::{Deserialize, Serialize};

/// JSON-Schema description of a tool published to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: serde_json::Value,
}

/// One inference request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Model identifier.
    pub model: String,
    /// Full conversation, system message included in-band.
    pub messages: Vec<Message>,
    /// Tool schemas.
    pub tools: Vec<ToolSchema>,
    /// Maximum output tokens.
    pub max_tokens: u32,
}

/// Token usage from a single inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
}

/// A completed inference: the assistant message plus usage.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Assistant message, possibly carrying tool calls.
    pub message: Message,
    /// Token usage for this call.
    pub usage: TokenUsage,
}
