use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::queue::{Query, QueryHandler};
use super::synthesis::{SynthesisDispatcher, SynthesisJob};
use super::{ClientSink, ConversationEvent};
use crate::core::history::HistoryStore;
use crate::core::llm::{ChatMessage, LanguageModel};
use crate::core::metrics::{TurnTimings, now_ms};

/// Turns one query into an assistant reply.
///
/// The reply is delivered before synthesis is dispatched, and synthesis never
/// delays the next turn. History is written back after every successful model
/// call; a failed write is logged and otherwise ignored.
pub struct TurnProcessor {
    model: Arc<dyn LanguageModel>,
    history: Arc<dyn HistoryStore>,
    sink: Arc<dyn ClientSink>,
    synthesis: SynthesisDispatcher,
}

impl TurnProcessor {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        history: Arc<dyn HistoryStore>,
        sink: Arc<dyn ClientSink>,
        synthesis: SynthesisDispatcher,
    ) -> Self {
        Self {
            model,
            history,
            sink,
            synthesis,
        }
    }

    async fn report(&self, message: String) {
        self.sink.deliver(ConversationEvent::Error(message)).await;
    }
}

#[async_trait]
impl QueryHandler for TurnProcessor {
    async fn handle(&self, query: Query) {
        let mut messages = match self.history.load(&query.session_id).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("Failed to load history for {}: {}", query.session_id, e);
                self.report(format!("Failed to load history: {e}")).await;
                return;
            }
        };
        messages.push(ChatMessage::user(query.text.as_str()));

        let llm_start_at = now_ms();
        let reply = match self.model.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Language model failed for {}: {}", query.session_id, e);
                self.report(e.to_string()).await;
                return;
            }
        };
        let llm_end_at = now_ms();

        info!(
            "Turn for {} answered in {} ms",
            query.session_id,
            llm_end_at - llm_start_at
        );
        self.sink
            .deliver(ConversationEvent::Assistant(reply.clone()))
            .await;

        if !reply.trim().is_empty() {
            self.synthesis.dispatch(SynthesisJob {
                session_id: query.session_id.clone(),
                query: query.text.clone(),
                text: reply.clone(),
                timings: TurnTimings {
                    final_received_at: query.final_received_at,
                    llm_start_at,
                    llm_end_at,
                },
            });
        }

        messages.push(ChatMessage::assistant(reply));
        if let Err(e) = self.history.save(&query.session_id, &messages).await {
            warn!("Failed to save history for {}: {}", query.session_id, e);
        }
    }
}
