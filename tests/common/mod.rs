//! Scripted capabilities and server helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use voicebridge::core::history::{HistoryConfig, SessionHistoryStore};
use voicebridge::core::metrics::{LatencyRecord, LatencySink};
use voicebridge::core::stt::SpeechEventSender;
use voicebridge::core::tts::TTSResult;
use voicebridge::{
    AppState, AudioData, ChatMessage, CoreState, LLMError, LanguageModel, STTError,
    ServerConfig, SpeechConnector, SpeechEvent, SpeechSocket, SpeechSynthesizer, TranscriptEvent,
    create_router,
};

pub type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        deepgram_api_key: None,
        stt_model: "nova-3".to_string(),
        stt_language: "en-GB".to_string(),
        stt_sample_rate: 48000,
        stt_endpointing_ms: 100,
        stt_keepalive_seconds: 12,
        stt_retry_delay_ms: 200,
        llm_api_key: None,
        llm_base_url: "https://api.groq.com/openai/v1".to_string(),
        llm_model: "moonshotai/kimi-k2-instruct-0905".to_string(),
        llm_max_attempts: 3,
        system_prompt_path: PathBuf::from("lib/prompts/prompt.txt"),
        tts_provider: "elevenlabs".to_string(),
        elevenlabs_api_key: None,
        elevenlabs_voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(),
        elevenlabs_model: "eleven_flash_v2_5".to_string(),
        history_path: None,
        history_ttl_seconds: 86_400,
        history_max_messages: 200,
        latency_log_path: PathBuf::from("logs/latency.jsonl"),
        bookings_path: PathBuf::from("bookings.csv"),
    }
}

/// Speech upstream driven by the audio itself: a frame `final:<text>` or
/// `interim:<text>` produces that transcript, anything else is plain audio.
#[derive(Default)]
pub struct ScriptedSpeech {
    pub connects: AtomicUsize,
    pub frames: Mutex<Vec<Bytes>>,
}

struct ScriptedSocket {
    owner: Arc<ScriptedSpeech>,
    events: SpeechEventSender,
    closed: AtomicBool,
}

#[async_trait]
impl SpeechSocket for ScriptedSocket {
    async fn send_audio(&self, audio: Bytes) -> Result<(), STTError> {
        self.owner.frames.lock().push(audio.clone());
        let text = String::from_utf8_lossy(&audio);
        let event = if let Some(text) = text.strip_prefix("final:") {
            TranscriptEvent::Final(text.to_string())
        } else if let Some(text) = text.strip_prefix("interim:") {
            TranscriptEvent::Interim(text.to_string())
        } else {
            return Ok(());
        };
        let _ = self.events.send(SpeechEvent::Transcript(event));
        Ok(())
    }

    async fn send_keepalive(&self) -> Result<(), STTError> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector handing out [`ScriptedSocket`]s that report back to one owner
pub struct ScriptedConnector(pub Arc<ScriptedSpeech>);

#[async_trait]
impl SpeechConnector for ScriptedConnector {
    async fn connect(&self, events: SpeechEventSender) -> Result<Arc<dyn SpeechSocket>, STTError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSocket {
            owner: self.0.clone(),
            events,
            closed: AtomicBool::new(false),
        }))
    }

    fn get_provider_info(&self) -> &'static str {
        "scripted"
    }
}

/// Upstream whose first connection rejects every frame and whose later
/// connects hang for `reconnect_delay` before failing
pub struct FailingReconnects {
    pub connects: AtomicUsize,
    pub reconnect_delay: Duration,
}

impl FailingReconnects {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            connects: AtomicUsize::new(0),
            reconnect_delay,
        }
    }
}

struct RejectingSocket {
    closed: AtomicBool,
}

#[async_trait]
impl SpeechSocket for RejectingSocket {
    async fn send_audio(&self, _audio: Bytes) -> Result<(), STTError> {
        Err(STTError::NetworkError("broken pipe".to_string()))
    }

    async fn send_keepalive(&self) -> Result<(), STTError> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechConnector for FailingReconnects {
    async fn connect(&self, _events: SpeechEventSender) -> Result<Arc<dyn SpeechSocket>, STTError> {
        if self.connects.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(Arc::new(RejectingSocket {
                closed: AtomicBool::new(false),
            }));
        }
        tokio::time::sleep(self.reconnect_delay).await;
        Err(STTError::ConnectionFailed("upstream unavailable".to_string()))
    }

    fn get_provider_info(&self) -> &'static str {
        "failing"
    }
}

/// Model with per-query replies, delays and failures that tracks how many
/// calls overlap
#[derive(Default)]
pub struct ScriptedModel {
    pub replies: HashMap<String, String>,
    pub delays: HashMap<String, Duration>,
    pub failures: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn reply(mut self, query: &str, reply: &str) -> Self {
        self.replies.insert(query.to_string(), reply.to_string());
        self
    }

    pub fn delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn fail(mut self, query: &str) -> Self {
        self.failures.insert(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LLMError> {
        let query = messages
            .last()
            .map(|m| m.content_str().to_string())
            .unwrap_or_default();
        self.calls.lock().push(query.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&query) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failures.contains(&query) {
            return Err(LLMError::ApiError("(500) model overloaded".to_string()));
        }
        Ok(self
            .replies
            .get(&query)
            .cloned()
            .unwrap_or_else(|| format!("reply to: {query}")))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Returns `audio:<text>` as the synthesized payload
pub struct EchoSynthesizer;

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> TTSResult<AudioData> {
        Ok(AudioData {
            data: Bytes::from(format!("audio:{text}")),
            sample_rate: 44100,
            format: "mp3".to_string(),
            duration_ms: None,
        })
    }

    fn get_provider_info(&self) -> &'static str {
        "echo"
    }
}

#[derive(Default)]
pub struct CollectingLatency(pub Mutex<Vec<LatencyRecord>>);

impl LatencySink for CollectingLatency {
    fn record(&self, record: LatencyRecord) {
        self.0.lock().push(record);
    }
}

pub async fn memory_history() -> Arc<SessionHistoryStore> {
    Arc::new(
        SessionHistoryStore::from_config(HistoryConfig::default())
            .await
            .unwrap(),
    )
}

/// Core state with every capability scripted
pub async fn scripted_core(speech: Arc<ScriptedSpeech>, model: Arc<ScriptedModel>) -> CoreState {
    CoreState::with_stores(memory_history().await, Arc::new(CollectingLatency::default()))
        .with_speech(Arc::new(ScriptedConnector(speech)))
        .with_model(model)
        .with_synthesizer(Arc::new(EchoSynthesizer))
        .with_timing(Duration::from_millis(10), Duration::from_secs(60))
}

/// Serve the full router on an ephemeral port
pub async fn spawn_server(core: CoreState) -> SocketAddr {
    let app = create_router(AppState::with_core(test_config(), Arc::new(core)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Connect and consume the `hello` event
pub async fn connect(addr: SocketAddr) -> (WsWrite, WsRead) {
    let url = format!("ws://{addr}/ws");
    let (ws_stream, _) = connect_async(url).await.expect("Failed to connect");
    let (write, mut read) = ws_stream.split();

    let hello = next_json(&mut read).await;
    assert_eq!(hello["type"], "hello");
    assert_eq!(hello["message"], "ws_connected");
    (write, read)
}

pub async fn next_message(read: &mut WsRead) -> Message {
    tokio::time::timeout(Duration::from_secs(5), read.next())
        .await
        .expect("Timed out waiting for server message")
        .expect("Connection closed")
        .expect("WebSocket error")
}

pub async fn next_json(read: &mut WsRead) -> Value {
    match next_message(read).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected text message, got {other:?}"),
    }
}

pub async fn next_binary(read: &mut WsRead) -> Bytes {
    match next_message(read).await {
        Message::Binary(data) => data,
        other => panic!("Expected binary message, got {other:?}"),
    }
}

pub async fn send_json(write: &mut WsWrite, value: Value) {
    write
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

pub async fn send_audio(write: &mut WsWrite, data: &str) {
    write
        .send(Message::Binary(Bytes::from(data.to_string())))
        .await
        .unwrap();
}

/// Assert nothing arrives for `wait`
pub async fn expect_silence(read: &mut WsRead, wait: Duration) {
    if let Ok(Some(message)) = tokio::time::timeout(wait, read.next()).await {
        panic!("Expected no message, got {message:?}");
    }
}
