//! Boundary to the chat-completion backend.

use agentnet_p2p::{ChatRequest, ChatResponse};
use async_trait::async_trait;

use crate::error::Result;

/// Serves chat-completion requests on behalf of the local agent.
///
/// The production implementation forwards to an external completion API;
/// this crate only consumes the boundary, so tests can inject a mock.
#[async_trait]
pub trait CompletionBackend: Send + Sync + 'static {
    /// Produces a completion for the request.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;
}
