use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::base::{STTError, SpeechConnector, SpeechEvent, SpeechEventSender, SpeechSocket};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(12);

struct ActiveSocket {
    socket: Arc<dyn SpeechSocket>,
    keepalive: CancellationToken,
}

impl ActiveSocket {
    async fn shutdown(self) {
        self.keepalive.cancel();
        self.socket.close().await;
    }
}

/// Raised while a connect or a send retry is in flight. Only the outermost
/// holder clears it.
struct ConnectingFlag<'a>(Option<&'a AtomicBool>);

impl<'a> ConnectingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        if flag.swap(true, Ordering::AcqRel) {
            Self(None)
        } else {
            Self(Some(flag))
        }
    }
}

impl Drop for ConnectingFlag<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.0 {
            flag.store(false, Ordering::Release);
        }
    }
}

/// Owns the upstream speech connection for one session.
///
/// All access goes through a single async mutex and a connecting flag, so
/// concurrent callers never open a second connection and audio frames reach
/// the upstream in arrival order. Calls that arrive while a connect or retry
/// is in flight return at once instead of waiting behind it.
pub struct SpeechSocketManager {
    connector: Arc<dyn SpeechConnector>,
    events: SpeechEventSender,
    active: Mutex<Option<ActiveSocket>>,
    connecting: AtomicBool,
    retry_delay: Duration,
    keepalive_interval: Duration,
}

impl SpeechSocketManager {
    pub fn new(connector: Arc<dyn SpeechConnector>, events: SpeechEventSender) -> Self {
        Self {
            connector,
            events,
            active: Mutex::new(None),
            connecting: AtomicBool::new(false),
            retry_delay: DEFAULT_RETRY_DELAY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    pub fn with_timing(mut self, retry_delay: Duration, keepalive_interval: Duration) -> Self {
        self.retry_delay = retry_delay;
        self.keepalive_interval = keepalive_interval;
        self
    }

    /// Open the upstream connection if none is open.
    ///
    /// A failure is also reported as a [`SpeechEvent::Error`]; the next audio
    /// frame will attempt to connect again. Returns at once if an attempt is
    /// already in flight.
    pub async fn connect(&self) -> Result<(), STTError> {
        if self.is_connecting() {
            return Ok(());
        }
        let mut slot = self.active.lock().await;
        self.ensure_connected(&mut slot).await.map(|_| ())
    }

    /// Forward one audio frame, connecting first when needed.
    ///
    /// A failed send closes the connection, waits `retry_delay`, reconnects and
    /// sends once more. If that also fails the frame is dropped. A frame that
    /// arrives while a connect is in flight is dropped and reported as sent.
    pub async fn send_audio(&self, audio: Bytes) -> Result<(), STTError> {
        if self.is_connecting() {
            debug!(
                "Speech connect in flight, dropping {} bytes of audio",
                audio.len()
            );
            return Ok(());
        }
        let mut slot = self.active.lock().await;
        let socket = self.ensure_connected(&mut slot).await?;

        let Err(first_error) = socket.send_audio(audio.clone()).await else {
            return Ok(());
        };
        warn!("Speech send failed, reconnecting: {}", first_error);

        let _connecting = ConnectingFlag::raise(&self.connecting);
        if let Some(stale) = slot.take() {
            stale.shutdown().await;
        }
        tokio::time::sleep(self.retry_delay).await;

        let socket = self.ensure_connected(&mut slot).await?;
        if let Err(e) = socket.send_audio(audio).await {
            warn!("Speech send retry failed, dropping frame: {}", e);
            let _ = self
                .events
                .send(SpeechEvent::Error(format!("Failed to forward audio: {e}")));
            return Err(e);
        }
        Ok(())
    }

    /// Close the upstream connection and stop its keepalive. Never fails.
    pub async fn disconnect(&self) {
        let mut slot = self.active.lock().await;
        if let Some(active) = slot.take() {
            active.shutdown().await;
            info!("Speech socket disconnected");
        }
    }

    /// True while a connect or a send retry is in flight
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    pub async fn is_connected(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| active.socket.is_open())
    }

    async fn ensure_connected(
        &self,
        slot: &mut Option<ActiveSocket>,
    ) -> Result<Arc<dyn SpeechSocket>, STTError> {
        if let Some(active) = slot.as_ref()
            && active.socket.is_open()
        {
            return Ok(active.socket.clone());
        }

        let _connecting = ConnectingFlag::raise(&self.connecting);
        if let Some(stale) = slot.take() {
            stale.shutdown().await;
        }

        match self.connector.connect(self.events.clone()).await {
            Ok(socket) => {
                let keepalive = self.spawn_keepalive(socket.clone());
                *slot = Some(ActiveSocket {
                    socket: socket.clone(),
                    keepalive,
                });
                info!(
                    "Speech socket connected via {}",
                    self.connector.get_provider_info()
                );
                Ok(socket)
            }
            Err(e) => {
                warn!("Speech connect failed; will retry on next audio chunk: {}", e);
                let _ = self.events.send(SpeechEvent::Error(format!(
                    "Speech connect failed; will retry on next audio chunk: {e}"
                )));
                Err(e)
            }
        }
    }

    fn spawn_keepalive(&self, socket: Arc<dyn SpeechSocket>) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = self.keepalive_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if !socket.is_open() {
                            break;
                        }
                        if let Err(e) = socket.send_keepalive().await {
                            debug!("Speech keepalive failed: {}", e);
                        }
                    }
                }
            }
        });

        token
    }
}

impl Drop for SpeechSocketManager {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.active.try_lock()
            && let Some(active) = slot.take()
        {
            active.keepalive.cancel();
        }
    }
}

/// Feeds audio to a [`SpeechSocketManager`] from its own task, so the caller
/// never waits on a connect or a send retry.
///
/// Frames keep their order. When a frame cannot be delivered, the frames
/// queued behind it are discarded rather than each triggering another
/// connection attempt.
pub struct AudioForwarder {
    manager: Arc<SpeechSocketManager>,
    frames: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

impl AudioForwarder {
    pub fn spawn(manager: Arc<SpeechSocketManager>, capacity: usize) -> Self {
        let (frames, mut queued) = mpsc::channel::<Bytes>(capacity);
        let cancel = CancellationToken::new();

        let cancelled = cancel.clone();
        let upstream = manager.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    frame = queued.recv() => match frame {
                        Some(frame) => frame,
                        None => break,
                    },
                };

                // Dropping the send on cancel releases the manager lock
                let result = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    result = upstream.send_audio(frame) => result,
                };

                if let Err(e) = result {
                    let mut discarded = 0usize;
                    while queued.try_recv().is_ok() {
                        discarded += 1;
                    }
                    debug!(
                        "Audio frame dropped ({}), discarded {} queued frames",
                        e, discarded
                    );
                }
            }
            debug!("Audio forwarder stopped");
        });

        Self {
            manager,
            frames,
            cancel,
        }
    }

    pub fn manager(&self) -> &Arc<SpeechSocketManager> {
        &self.manager
    }

    /// Queue one frame without waiting. Returns `false` if it was dropped.
    pub fn forward(&self, audio: Bytes) -> bool {
        if self.manager.is_connecting() {
            debug!(
                "Speech connect in flight, dropping {} bytes of audio",
                audio.len()
            );
            return false;
        }
        match self.frames.try_send(audio) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(audio)) => {
                warn!("Audio queue full, dropping {} bytes", audio.len());
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Stop forwarding and close the upstream connection.
    ///
    /// An in-flight connect or retry is abandoned, so this returns promptly.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.manager.disconnect().await;
    }
}

impl Drop for AudioForwarder {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
