//! WebSocket message processing
//!
//! Routes control messages, audio frames and speech events for one
//! connection. All functions here run on the connection's receive loop, so
//! none of them waits on the speech upstream beyond the initial connect.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::conversation::{
    ClientSink, Query, QueryQueue, SynthesisDispatcher, TurnProcessor,
};
use crate::core::metrics::now_ms;
use crate::core::stt::{
    AudioForwarder, SpeechEvent, SpeechEventSender, SpeechSocketManager, TranscriptEvent,
};
use crate::state::AppState;

use super::{
    error::{WebSocketError, WebSocketResult},
    messages::{IncomingMessage, MessageRoute, OutgoingMessage},
    state::{ConnectionState, SessionPhase, SessionSpeechEvent},
};

/// Audio frames buffered ahead of the speech upstream
const AUDIO_BUFFER_FRAMES: usize = 64;

/// Handles shared by every message of one connection
pub struct SessionContext {
    pub app_state: Arc<AppState>,
    pub message_tx: mpsc::Sender<MessageRoute>,
    /// Every speech connection the session opens reports here, tagged
    pub speech_events: mpsc::UnboundedSender<SessionSpeechEvent>,
}

impl SessionContext {
    pub async fn send(&self, message: OutgoingMessage) {
        if self
            .message_tx
            .send(MessageRoute::Outgoing(message))
            .await
            .is_err()
        {
            debug!("Client gone, dropping outgoing message");
        }
    }
}

/// What a binary frame turned out to be
#[derive(Debug)]
pub enum BinaryFrame {
    /// JSON payload; the inner result is whether it is a known control message
    Control(Result<IncomingMessage, serde_json::Error>),
    Audio(Bytes),
}

/// Split control frames from audio without parsing audio.
///
/// Only frames starting with `{` or `[` are considered, and only if the whole
/// frame is valid JSON. Everything else is audio.
pub fn classify_binary_frame(data: Bytes) -> BinaryFrame {
    if !matches!(data.first(), Some(b'{') | Some(b'[')) {
        return BinaryFrame::Audio(data);
    }
    match serde_json::from_slice::<serde_json::Value>(&data) {
        Ok(value) => BinaryFrame::Control(serde_json::from_value(value)),
        Err(_) => BinaryFrame::Audio(data),
    }
}

/// Process incoming control message based on its type
pub async fn handle_incoming_message(
    msg: IncomingMessage,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) {
    match msg {
        IncomingMessage::Start { session_id } => handle_start(session_id, state, ctx).await,
        IncomingMessage::Stop => handle_stop(state, ctx).await,
    }
}

async fn handle_start(
    session_id: Option<String>,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) {
    match start_session(session_id, state, ctx).await {
        Ok(session_id) => {
            info!("Session {} started", session_id);
            ctx.send(OutgoingMessage::Ready { session_id }).await;
        }
        Err(e) => {
            warn!("Rejected start: {}", e);
            ctx.send(OutgoingMessage::error(e.to_message())).await;
        }
    }
}

async fn start_session(
    session_id: Option<String>,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) -> WebSocketResult<String> {
    let session_id = session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    if state.is_active() {
        return Ok(rebind_session(session_id, state).await);
    }

    let core = &ctx.app_state.core_state;
    let (Some(speech), Some(model), Some(synthesizer)) = (
        core.speech.clone(),
        core.model.clone(),
        core.synthesizer.clone(),
    ) else {
        return Err(WebSocketError::CapabilitiesMissing(
            core.missing_capabilities().join(", "),
        ));
    };

    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if state.queue.is_none() {
        let sink: Arc<dyn ClientSink> = Arc::new(ctx.message_tx.clone());
        let synthesis = SynthesisDispatcher::new(synthesizer, core.latency.clone(), sink.clone());
        let processor = TurnProcessor::new(model, core.history.clone(), sink, synthesis);
        state.queue = Some(QueryQueue::new(Arc::new(processor)));
    }

    state.speech_generation += 1;
    let events = relay_speech_events(state.speech_generation, ctx);
    let manager = Arc::new(
        SpeechSocketManager::new(speech, events)
            .with_timing(core.stt_retry_delay, core.stt_keepalive_interval),
    );
    // Failure is already reported as a speech event; audio retries lazily.
    if let Err(e) = manager.connect().await {
        debug!("Starting session without speech connection: {}", e);
    }

    state.speech = Some(AudioForwarder::spawn(manager, AUDIO_BUFFER_FRAMES));
    state.session_id = Some(session_id.clone());
    state.phase = SessionPhase::Active;
    Ok(session_id)
}

/// `start` on an active session: keep the speech connection and queue, bind
/// the new id if one was given, and make sure the upstream is connected.
async fn rebind_session(session_id: Option<String>, state: &mut ConnectionState) -> String {
    if let Some(id) = session_id {
        state.session_id = Some(id);
    }
    if let Some(speech) = &state.speech
        && let Err(e) = speech.manager().connect().await
    {
        debug!("Session restarted without speech connection: {}", e);
    }
    state.session_id.clone().unwrap_or_default()
}

/// Per-connection channel for one speech manager, forwarded into the
/// session's event stream with its generation attached.
fn relay_speech_events(generation: u64, ctx: &SessionContext) -> SpeechEventSender {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let session_events = ctx.speech_events.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if session_events
                .send(SessionSpeechEvent { generation, event })
                .is_err()
            {
                break;
            }
        }
    });
    events_tx
}

async fn handle_stop(state: &mut ConnectionState, ctx: &SessionContext) {
    state.release_speech().await;
    state.clear_conversation();
    if state.phase == SessionPhase::Active {
        state.phase = SessionPhase::AwaitingStart;
    }
    info!(
        "Session {} stopped",
        state.session_id.as_deref().unwrap_or("<unbound>")
    );
    ctx.send(OutgoingMessage::Stopped).await;
}

/// Hand one audio frame to the speech forwarder; dropped unless the session
/// is active. Never waits on the upstream.
pub fn handle_audio_message(data: Bytes, state: &ConnectionState) {
    if !state.is_active() {
        debug!("Dropping {} bytes of audio: session not started", data.len());
        return;
    }
    if let Some(speech) = &state.speech {
        speech.forward(data);
    }
}

/// Drop events from speech connections released by an earlier `stop`
pub async fn relay_session_speech_event(
    tagged: SessionSpeechEvent,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) {
    if tagged.generation != state.speech_generation || state.speech.is_none() {
        debug!(
            "Dropping speech event from released connection {}",
            tagged.generation
        );
        return;
    }
    handle_speech_event(tagged.event, state, ctx).await;
}

/// Relay one speech event to the client, enqueueing finals
pub async fn handle_speech_event(
    event: SpeechEvent,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) {
    match event {
        SpeechEvent::Transcript(transcript) => {
            if !state.is_active() {
                debug!("Dropping transcript: session not started");
                return;
            }
            handle_transcript(transcript, state, ctx).await;
        }
        SpeechEvent::UtteranceEnd => debug!("Utterance end"),
        SpeechEvent::Error(message) => ctx.send(OutgoingMessage::Error { message }).await,
    }
}

async fn handle_transcript(
    transcript: TranscriptEvent,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) {
    match transcript {
        TranscriptEvent::Interim(text) => {
            state.last_interim = Some(text.clone());
            ctx.send(OutgoingMessage::Interim { text }).await;
        }
        TranscriptEvent::Final(text) => {
            let Some(session_id) = state.session_id.as_deref() else {
                return;
            };
            let Some(query) = Query::from_final(&text, session_id, now_ms()) else {
                return;
            };

            state.last_interim = None;
            state.last_final = Some(query.text.clone());
            ctx.send(OutgoingMessage::Final {
                text: query.text.clone(),
            })
            .await;

            if let Some(queue) = &state.queue {
                queue.enqueue(query);
            }
        }
    }
}
