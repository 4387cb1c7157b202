//! # WebSocket Voice Conversation Module
//!
//! One WebSocket connection carries one conversation session: microphone audio
//! goes up as binary frames, transcripts and assistant replies come back as
//! JSON events, and synthesized replies come back as binary frames.
//!
//! ## Connection Flow
//! 1. Client connects to `/ws`; the server sends `hello`
//! 2. Client sends `start` (optionally with a `session_id`); the server opens
//!    the speech-recognition connection and answers `ready`
//! 3. Client streams raw PCM audio as binary frames
//! 4. Server sends `interim` and `final` transcripts. Every final is queued as
//!    a query; each query produces an `assistant` event and later one binary
//!    audio frame
//! 5. `stop` releases the speech connection and drops queued queries; the
//!    client may `start` again on the same connection
//!
//! ## Message Types
//!
//! **Incoming Messages:**
//! - `{"type": "start", "session_id": "s1"}` - Start (or resume) a session
//! - `{"type": "stop"}` - Stop the session, keeping the connection open
//! - **Binary messages** - Raw audio. Binary frames that start with `{` or `[`
//!   and parse as JSON are treated as control messages instead.
//!
//! **Outgoing Messages:**
//! - `{"type": "hello", "message": "ws_connected"}`
//! - `{"type": "ready", "session_id": "s1"}`
//! - `{"type": "interim", "text": "..."}` / `{"type": "final", "text": "..."}`
//! - `{"type": "assistant", "text": "..."}` - Reply text, possibly empty
//! - `{"type": "stopped"}`
//! - `{"type": "error", "message": "..."}` - Never closes the connection
//! - **Binary messages** - One complete synthesized reply each. Audio may
//!   arrive after later `assistant` events.

pub mod error;
pub mod handler;
pub mod messages;
pub mod processor;
pub mod state;


// Re-export commonly used items
pub use error::{WebSocketError, WebSocketResult};
pub use handler::ws_voice_handler;
pub use messages::{IncomingMessage, MessageRoute, OutgoingMessage};
pub use state::{ConnectionState, SessionPhase};
