//! TCP listener and connection lifecycle.
//!
//! The listener owns the process-wide shared state — the classifier pair,
//! the MFCC extractor and the diagnostics counters — and hands an `Arc` of
//! it to one spawned task per accepted connection. Connections never
//! coordinate with each other; the shared state is read-only after
//! construction (the counters are atomic).

pub mod connection;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::classify::{ClassifierPair, WindowVerdict};
use crate::error::Result;
use crate::features::{MfccExtractor, MODEL_SAMPLE_RATE};
use crate::protocol::{Decision, SOURCE_SAMPLE_RATE};
use crate::window::WINDOW_SAMPLES;

/// Tunables for the triage server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds. Default `127.0.0.1:5050`.
    pub bind_addr: SocketAddr,
    /// Wire sample rate (Hz), fixed by the client contract. Default 48000.
    pub source_rate: u32,
    /// Sample rate the classifiers were trained at (Hz). Default 16000.
    pub target_rate: u32,
    /// Samples per classification window at the target rate. Default 1600.
    pub window_samples: usize,
    /// Reject frames declaring more than this many payload bytes. `None`
    /// (the default) preserves the deployed behavior: the declared length
    /// is unbounded and allocations follow it, a known exhaustion risk.
    pub max_frame_bytes: Option<u32>,
    /// Per-frame read timeout covering header and payload. `None` (the
    /// default) preserves the deployed behavior: a silent client holds its
    /// connection task indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5050),
            source_rate: SOURCE_SAMPLE_RATE,
            target_rate: MODEL_SAMPLE_RATE,
            window_samples: WINDOW_SAMPLES,
            max_frame_bytes: None,
            read_timeout: None,
        }
    }
}

/// Shared atomic counters for observability.
#[derive(Debug, Default)]
pub struct ServerDiagnostics {
    pub connections: AtomicUsize,
    pub frames_in: AtomicUsize,
    pub samples_resampled: AtomicUsize,
    pub windows_classified: AtomicUsize,
    pub speech_windows: AtomicUsize,
    pub passes: AtomicUsize,
    pub mutes: AtomicUsize,
    pub protocol_errors: AtomicUsize,
    pub collaborator_errors: AtomicUsize,
}

impl ServerDiagnostics {
    pub(crate) fn record_verdict(&self, verdict: &WindowVerdict) {
        self.windows_classified.fetch_add(1, Ordering::Relaxed);
        if verdict.speech {
            self.speech_windows.fetch_add(1, Ordering::Relaxed);
        }
        match verdict.decision {
            Decision::Pass => self.passes.fetch_add(1, Ordering::Relaxed),
            Decision::Mute => self.mutes.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            frames_in: self.frames_in.load(Ordering::Relaxed),
            samples_resampled: self.samples_resampled.load(Ordering::Relaxed),
            windows_classified: self.windows_classified.load(Ordering::Relaxed),
            speech_windows: self.speech_windows.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            mutes: self.mutes.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            collaborator_errors: self.collaborator_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub connections: usize,
    pub frames_in: usize,
    pub samples_resampled: usize,
    pub windows_classified: usize,
    pub speech_windows: usize,
    pub passes: usize,
    pub mutes: usize,
    pub protocol_errors: usize,
    pub collaborator_errors: usize,
}

/// State shared by the listener and every connection task.
pub(crate) struct ServerShared {
    pub config: ServerConfig,
    pub classifiers: ClassifierPair,
    pub extractor: Arc<MfccExtractor>,
    pub diagnostics: Arc<ServerDiagnostics>,
}

/// The audio triage server.
///
/// Both classifier artifacts are an explicit constructor dependency — they
/// must be loaded (or stubbed) before a server exists, which keeps startup
/// failure process-fatal and the core testable without real models.
pub struct TriageServer {
    shared: Arc<ServerShared>,
}

impl TriageServer {
    pub fn new(config: ServerConfig, classifiers: ClassifierPair) -> Self {
        let extractor = Arc::new(MfccExtractor::new(config.target_rate));
        Self {
            shared: Arc::new(ServerShared {
                config,
                classifiers,
                extractor,
                diagnostics: Arc::new(ServerDiagnostics::default()),
            }),
        }
    }

    /// Handle to the shared counters, valid for the server's lifetime.
    pub fn diagnostics(&self) -> Arc<ServerDiagnostics> {
        Arc::clone(&self.shared.diagnostics)
    }

    /// Bind the configured address and serve until accept fails fatally or
    /// the task is dropped.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.shared.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener. Lets callers (and tests) bind
    /// port 0 first and learn the actual address.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "triage server listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            self.shared
                .diagnostics
                .connections
                .fetch_add(1, Ordering::Relaxed);
            let shared = Arc::clone(&self.shared);
            tokio::spawn(connection::handle(stream, peer, shared));
        }
    }
}
