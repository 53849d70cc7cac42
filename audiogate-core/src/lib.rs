//! # audiogate-core
//!
//! Real-time audio triage engine: classify short windows of a live audio
//! stream and answer a binary routing decision so clients can mute
//! background noise without losing safety-relevant sounds.
//!
//! ## Architecture
//!
//! ```text
//! TcpListener → one task per connection
//!                    │
//!        read length-prefixed frame (48 kHz f32 PCM)
//!                    │
//!              RateConverter → 16 kHz
//!                    │
//!         WindowBuffer (1600-sample windows, reset-after-emit)
//!                    │
//!       MfccExtractor → ClassifierPair (speech + urban)
//!                    │
//!          Decision token ("pass" | "mute") → same connection
//! ```
//!
//! The classifier artifacts are the only cross-connection state: loaded
//! once, immutable, injected into the listener at construction.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod classify;
pub mod error;
pub mod features;
pub mod protocol;
pub mod resample;
pub mod server;
pub mod window;

// Convenience re-exports for downstream crates
pub use classify::{ClassifierPair, SpeechClassifier, UrbanClassifier, UrbanLabel, WindowVerdict};
pub use error::GateError;
pub use protocol::Decision;
pub use server::{ServerConfig, ServerDiagnostics, TriageServer};
pub use window::{WindowBuffer, WINDOW_SAMPLES};

#[cfg(feature = "onnx")]
pub use classify::{OnnxSpeechClassifier, OnnxUrbanClassifier};
