pub(crate) mod openai;

use async_trait::async_trait;

/// Something that turns a prompt into generated text.
///
/// Note for async_trait: the gateway holds the generator as `Arc<dyn Generator>`, so the trait has to stay
/// dyn-compatible.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates a completion for a single user prompt.
    ///
    /// Called once per admitted request. Failures are reported to the caller as they are and never retried.
    async fn generate(&self, prompt: &str) -> crate::Result<String>;
}
