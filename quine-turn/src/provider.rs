//! The [`Provider`] trait.

use std::future::Future;

use crate::error::ProviderError;
use crate::types::{Completion, ProviderRequest};

/// LLM provider interface.
///
/// Uses RPITIT and is intentionally not object-safe; the turn loop is
/// generic over `P: Provider` and the binary selects the concrete dialect
/// at startup.
pub trait Provider: Send + Sync {
    /// Run one inference.
    fn generate(
        &self,
        request: ProviderRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send;
}
