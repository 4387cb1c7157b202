//! Deepgram streaming speech-recognition transport.
//!
//! [`DeepgramSTT`] is constructed once per process and opens one upstream
//! WebSocket per session. Each connection runs a single task that owns both
//! halves of the stream: outgoing frames arrive through an unbounded channel,
//! incoming text frames are classified by [`parse_deepgram_message`] and pushed
//! into the session's [`SpeechEventSender`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::Message,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{
    STTConfig, STTError, SpeechConnector, SpeechEvent, SpeechEventSender, SpeechSocket,
    TranscriptEvent,
};

pub const DEEPGRAM_LISTEN_URL: &str = "wss://api.deepgram.com/v1/listen";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deepgram streaming response. Only the fields used for classification are
/// decoded; everything else is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct DeepgramResponse {
    #[serde(rename = "type", default)]
    pub response_type: Option<String>,
    /// An object on `Results`, an index list on `UtteranceEnd`
    #[serde(default)]
    pub channel: Option<serde_json::Value>,
    #[serde(default)]
    pub is_final: Option<bool>,
    #[serde(default)]
    pub speech_final: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeepgramChannel {
    #[serde(default)]
    pub alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeepgramAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// Classify one inbound Deepgram text frame.
///
/// A frame with a channel yields at most one transcript event, followed by an
/// utterance-end hint when both `is_final` and `speech_final` are set. Frames
/// with blank transcripts yield nothing.
pub fn parse_deepgram_message(text: &str) -> Result<Vec<SpeechEvent>, serde_json::Error> {
    let response: DeepgramResponse = serde_json::from_str(text)?;
    let mut events = Vec::new();

    match response.response_type.as_deref() {
        Some("UtteranceEnd") => {
            events.push(SpeechEvent::UtteranceEnd);
            return Ok(events);
        }
        Some("Error") => {
            let detail = response
                .description
                .or(response.message)
                .unwrap_or_else(|| "unknown error".to_string());
            events.push(SpeechEvent::Error(format!("Speech provider error: {detail}")));
            return Ok(events);
        }
        Some("Metadata") => {
            debug!("Received Deepgram metadata");
            return Ok(events);
        }
        _ => {}
    }

    let Some(channel) = response.channel.filter(|c| c.is_object()) else {
        debug!("Ignoring Deepgram message of type {:?}", response.response_type);
        return Ok(events);
    };
    let channel: DeepgramChannel = serde_json::from_value(channel)?;

    let transcript = channel
        .alternatives
        .first()
        .map(|alt| alt.transcript.as_str())
        .unwrap_or_default();

    if transcript.trim().is_empty() {
        return Ok(events);
    }

    let is_final = response.is_final.unwrap_or(false);
    let event = if is_final {
        TranscriptEvent::Final(transcript.to_string())
    } else {
        TranscriptEvent::Interim(transcript.to_string())
    };
    events.push(SpeechEvent::Transcript(event));

    if is_final && response.speech_final.unwrap_or(false) {
        events.push(SpeechEvent::UtteranceEnd);
    }

    Ok(events)
}

/// Deepgram connector shared by every session
pub struct DeepgramSTT {
    config: STTConfig,
}

impl DeepgramSTT {
    pub fn new(config: STTConfig) -> Result<Self, STTError> {
        if config.api_key.is_empty() {
            return Err(STTError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Build the WebSocket URL with query parameters
    pub fn build_websocket_url(&self) -> Result<String, STTError> {
        let mut url = Url::parse(DEEPGRAM_LISTEN_URL)
            .map_err(|e| STTError::ConfigurationError(format!("Invalid WebSocket URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("model", &self.config.model)
            .append_pair("interim_results", "true")
            .append_pair("punctuate", "true")
            .append_pair("vad_events", "true")
            .append_pair("endpointing", &self.config.endpointing_ms.to_string())
            .append_pair("encoding", &self.config.encoding)
            .append_pair("sample_rate", &self.config.sample_rate.to_string())
            .append_pair("channels", &self.config.channels.to_string())
            .append_pair("smart_format", "true")
            .append_pair("language", &self.config.language);

        Ok(url.to_string())
    }
}

#[async_trait::async_trait]
impl SpeechConnector for DeepgramSTT {
    async fn connect(&self, events: SpeechEventSender) -> Result<Arc<dyn SpeechSocket>, STTError> {
        let ws_url = self.build_websocket_url()?;

        let mut request = ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| STTError::ConfigurationError(format!("Invalid request: {e}")))?;
        let auth = HeaderValue::from_str(&format!("Token {}", self.config.api_key))
            .map_err(|e| STTError::AuthenticationFailed(format!("Invalid API key: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws_stream, _) = match timeout(CONNECT_TIMEOUT, connect_async(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Failed to connect to Deepgram: {}", e);
                return Err(STTError::ConnectionFailed(e.to_string()));
            }
            Err(_) => return Err(STTError::ConnectionFailed("Connection timeout".to_string())),
        };

        info!("Connected to Deepgram WebSocket");

        let (ws_tx, ws_rx) = mpsc::unbounded_channel::<Message>();
        let open = Arc::new(AtomicBool::new(true));
        let shutdown = CancellationToken::new();

        tokio::spawn(run_connection(
            ws_stream,
            ws_rx,
            events,
            open.clone(),
            shutdown.clone(),
        ));

        Ok(Arc::new(DeepgramSocket {
            ws_sender: ws_tx,
            open,
            shutdown,
        }))
    }

    fn get_provider_info(&self) -> &'static str {
        "Deepgram STT WebSocket v1"
    }
}

async fn run_connection<S>(
    ws_stream: S,
    mut ws_rx: mpsc::UnboundedReceiver<Message>,
    events: SpeechEventSender,
    open: Arc<AtomicBool>,
    shutdown: CancellationToken,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = ws_sink
                    .send(Message::Text(r#"{"type":"CloseStream"}"#.into()))
                    .await;
                let _ = ws_sink.close().await;
                break;
            }

            Some(message) = ws_rx.recv() => {
                if let Err(e) = ws_sink.send(message).await {
                    error!("Failed to send frame to Deepgram: {}", e);
                    break;
                }
            }

            message = ws_stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => match parse_deepgram_message(&text) {
                        Ok(parsed) => {
                            for event in parsed {
                                let _ = events.send(event);
                            }
                        }
                        Err(e) => warn!("Failed to parse Deepgram message: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        info!("Deepgram closed the stream: {:?}", frame);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Deepgram stream error: {}", e);
                        let _ = events.send(SpeechEvent::Error(format!("Speech stream error: {e}")));
                        break;
                    }
                    None => {
                        info!("Deepgram stream ended");
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    debug!("Deepgram connection task finished");
}

/// Handle to one live Deepgram stream
struct DeepgramSocket {
    ws_sender: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl DeepgramSocket {
    fn send_frame(&self, message: Message) -> Result<(), STTError> {
        if !self.is_open() {
            return Err(STTError::SocketClosed);
        }
        self.ws_sender
            .send(message)
            .map_err(|e| STTError::NetworkError(format!("Failed to queue frame: {e}")))
    }
}

#[async_trait::async_trait]
impl SpeechSocket for DeepgramSocket {
    async fn send_audio(&self, audio: Bytes) -> Result<(), STTError> {
        let len = audio.len();
        self.send_frame(Message::Binary(audio))?;
        debug!("Queued {} bytes of audio for Deepgram", len);
        Ok(())
    }

    async fn send_keepalive(&self) -> Result<(), STTError> {
        self.send_frame(Message::Text(r#"{"type":"KeepAlive"}"#.into()))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.ws_sender.is_closed()
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }
}

impl Drop for DeepgramSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
