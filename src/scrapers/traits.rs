use crate::models::SelectorCandidate;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Page rendering capability the extractor drives.
/// Implemented by headless Chrome in production and by in-memory fakes in tests.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load `url` in the rendering tab. An error means the page did not load.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Poll for up to `timeout` for the first element matching `candidate`,
    /// scroll it into view and return its visible text.
    ///
    /// `Ok(None)` when nothing matched in time.
    async fn visible_text(
        &self,
        candidate: &SelectorCandidate,
        timeout: Duration,
    ) -> Result<Option<String>>;

    /// Name used in logs
    fn renderer_name(&self) -> &'static str;
}
