use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ClientSink, ConversationEvent};
use crate::core::metrics::{LatencyRecord, LatencySink, TurnTimings, now_ms};
use crate::core::tts::SpeechSynthesizer;

/// One reply to speak
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub session_id: String,
    pub query: String,
    pub text: String,
    pub timings: TurnTimings,
}

/// Fire-and-forget synthesis. Each job runs on its own task, so jobs from
/// consecutive turns may overlap and finish in any order.
#[derive(Clone)]
pub struct SynthesisDispatcher {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    latency: Arc<dyn LatencySink>,
    sink: Arc<dyn ClientSink>,
}

impl SynthesisDispatcher {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        latency: Arc<dyn LatencySink>,
        sink: Arc<dyn ClientSink>,
    ) -> Self {
        Self {
            synthesizer,
            latency,
            sink,
        }
    }

    pub fn dispatch(&self, job: SynthesisJob) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run(job).await })
    }

    async fn run(&self, job: SynthesisJob) {
        let text = job.text.trim();
        if text.is_empty() {
            return;
        }

        let tts_start_at = now_ms();
        self.latency.record(LatencyRecord::new(
            job.session_id.as_str(),
            job.query.as_str(),
            job.timings,
            tts_start_at,
        ));

        match self.synthesizer.synthesize(text).await {
            Ok(audio) if !audio.is_empty() => {
                debug!(
                    "Synthesized {} bytes of {} for {}",
                    audio.data.len(),
                    audio.format,
                    job.session_id
                );
                self.sink.deliver(ConversationEvent::Audio(audio.data)).await;
            }
            Ok(_) => debug!("Synthesis returned no audio for {}", job.session_id),
            Err(e) => {
                warn!("Synthesis failed for {}: {}", job.session_id, e);
                self.sink
                    .deliver(ConversationEvent::Error(format!("TTS failed: {e}")))
                    .await;
            }
        }
    }
}
