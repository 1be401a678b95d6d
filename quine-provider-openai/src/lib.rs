#![deny(missing_docs)]
//! OpenAI-style provider for the quine runtime.
//!
//! Speaks the Chat Completions dialect: system message in-band, tool
//! calls as `tool_calls` entries with JSON-encoded argument strings, tool
//! results as `role: "tool"` messages, Bearer auth.

mod client;
mod error;
mod mapping;

pub use client::OpenAi;
