//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and fallback endpoints
//! - `ws` - WebSocket voice conversation sessions

pub mod api;
pub mod ws;

pub use ws::ws_voice_handler;
