use bytes::Bytes;
use futures_util::Stream;
use tracing::info;

use crate::agent::CompletionAgent;
use crate::errors::{AppError, StreamError};
use crate::models::ChatTurn;

/// Stateless per request; cloned into every handler as axum state.
#[derive(Clone)]
pub struct ChatService {
    agent: CompletionAgent,
}

impl ChatService {
    pub fn new(agent: CompletionAgent) -> Self {
        Self { agent }
    }

    /// Fails fast when no upstream credential was configured.
    pub fn ensure_configured(&self) -> Result<(), AppError> {
        if self.agent.has_credential() {
            Ok(())
        } else {
            Err(AppError::MissingCredential)
        }
    }

    /// Forwards `history` upstream and hands back the reply as text deltas.
    pub async fn stream_reply(
        &self,
        history: &[ChatTurn],
    ) -> Result<impl Stream<Item = Result<Bytes, StreamError>> + Send + 'static, AppError> {
        let deltas = self.agent.stream_completion(history).await?;
        info!("Upstream accepted the request, relaying reply");
        Ok(deltas)
    }
}
