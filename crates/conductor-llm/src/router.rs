use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::provider::{LlmProvider, StreamEvent};
use crate::types::{ChatRequest, ChatResponse};

/// Configuration for a single provider slot inside the router.
pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
    /// Maximum number of attempts before moving to the next slot.
    pub max_retries: u32,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            provider,
            max_retries,
        }
    }
}

/// Routes requests across configured provider slots with bounded retry and
/// ordered failover. The provider/model id itself is read off `req` by the
/// caller, resolved from the tenant's configuration rather than a single
/// process-wide default.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        assert!(!slots.is_empty(), "ProviderRouter requires at least one provider slot");
        Self { slots }
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut last_err: Option<LlmError> = None;

        for slot in &self.slots {
            let provider_name = slot.provider.name();

            for attempt in 0..=slot.max_retries {
                match slot.provider.send(req).await {
                    Ok(resp) => {
                        if attempt > 0 {
                            info!(provider = %provider_name, attempt, "request succeeded after retry");
                        }
                        return Ok(resp);
                    }
                    Err(e) => {
                        warn!(provider = %provider_name, attempt, err = %e, "provider send failed");

                        if matches!(e, LlmError::RateLimited { .. }) {
                            last_err = Some(e);
                            break;
                        }
                        last_err = Some(e);

                        if attempt < slot.max_retries {
                            tokio::time::sleep(tokio::time::Duration::from_millis(
                                200 * (attempt as u64 + 1),
                            ))
                            .await;
                        }
                    }
                }
            }
            info!(provider = %provider_name, "provider exhausted, trying next provider");
        }

        Err(last_err.unwrap_or_else(|| LlmError::Unavailable("all providers failed".to_string())))
    }

    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), LlmError> {
        for slot in &self.slots {
            if slot.provider.send_stream(req, tx.clone()).await.is_ok() {
                return Ok(());
            }
        }
        Err(LlmError::Unavailable("all providers failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::types::Message;

    struct AlwaysFail;

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, LlmError> {
            Err(LlmError::Unavailable("intentional failure".to_string()))
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                finish_reason: "stop".to_string(),
                tool_calls: Vec::new(),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest::new("test", "test-model", vec![Message::user("hello")])
    }

    #[tokio::test]
    async fn router_falls_back_to_second_provider() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail), 0),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ]);
        let result = router.send(&dummy_request()).await;
        assert_eq!(result.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn router_errors_when_all_fail() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail), 0),
            ProviderSlot::new(Box::new(AlwaysFail), 0),
        ]);
        assert!(router.send(&dummy_request()).await.is_err());
    }
}
