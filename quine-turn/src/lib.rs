#![deny(missing_docs)]
//! Provider seam for the quine runtime.
//!
//! Defines the wire-neutral request/response types, the [`Provider`]
//! trait each dialect implements, the error taxonomy the turn loop
//! classifies on, and the shared retry-with-backoff policy.

pub mod error;
pub mod provider;
pub mod retry;
pub mod types;

pub use error::ProviderError;
pub use provider::Provider;
pub use retry::generate_with_retry;
pub use types::{Completion, ProviderRequest, TokenUsage, ToolSchema};
