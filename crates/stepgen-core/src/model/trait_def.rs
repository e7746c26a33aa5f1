//! The `Model` trait -- the adapter interface for generative models.
//!
//! Every model call the pipeline makes goes through this trait, so tests
//! can substitute a scripted model and the CLI can pick any backend. The
//! trait is object-safe and is passed around as `&dyn Model`.

use anyhow::Result;
use async_trait::async_trait;

/// A text-in, text-out generative model.
#[async_trait]
pub trait Model: Send + Sync {
    /// Human-readable name for this model (e.g. "claude:sonnet").
    fn name(&self) -> &str;

    /// Send a prompt and return the model's full response text.
    ///
    /// Implementations return `Err` for transport failures, timeouts and
    /// refusals. An empty response is *not* an error at this layer; callers
    /// decide whether empty text is acceptable.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// Compile-time assertion: Model must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Model) {}
};
