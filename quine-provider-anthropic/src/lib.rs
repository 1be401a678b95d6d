#![deny(missing_docs)]
//! Anthropic-style provider for the quine runtime.
//!
//! Speaks the Messages dialect: system prompt as a top-level field,
//! tool calls as `tool_use` content blocks with inline argument objects,
//! tool results as `tool_result` blocks, custom header auth.

mod client;
mod error;
mod mapping;

pub use client::Anthropic;
