use anyhow::Result;

/// A service that produces answer text from an assembled prompt
#[allow(async_fn_in_trait)]
pub trait Generator {
    /// Generate text for the prompt; network and service failures are errors
    async fn generate(&self, prompt: &str) -> Result<String>;
}
