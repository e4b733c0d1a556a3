use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, TokenInfo};

/// One chunk of a streamed response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta { text: String },
    Done {
        model: String,
        tokens_in: u32,
        tokens_out: u32,
        finish_reason: String,
    },
}

/// Common interface for every configured model slot.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a non-streaming chat request, wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Stream response events through a channel. Default: falls back to
    /// non-streaming send, emits a single TextDelta + Done.
    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), LlmError> {
        let resp = self.send(req).await?;
        let _ = tx
            .send(StreamEvent::TextDelta {
                text: resp.content.clone(),
            })
            .await;
        let _ = tx
            .send(StreamEvent::Done {
                model: resp.model,
                tokens_in: resp.tokens_in,
                tokens_out: resp.tokens_out,
                finish_reason: resp.finish_reason,
            })
            .await;
        Ok(())
    }

    /// Current authentication state. Providers without tokens return `None`.
    fn token_info(&self) -> Option<TokenInfo> {
        None
    }
}
