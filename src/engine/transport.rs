use async_trait::async_trait;

use super::method::{EngineMode, EngineRequest};
use crate::error::EngineError;

/// Carries one request to an engine and brings back its response.
///
/// The queue never calls `round_trip` again before the previous call returned.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Which transport this is.
    fn mode(&self) -> EngineMode;

    /// Sends `request` and waits for the matching response.
    async fn round_trip(&mut self, request: EngineRequest) -> Result<Vec<u8>, EngineError>;
}
