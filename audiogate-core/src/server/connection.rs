//! Per-connection state machine.
//!
//! ```text
//! ReadingHeader ──► ReadingPayload ──► resample ──► window push
//!       ▲                                               │
//!       │                                      window full? ── no ─┐
//!       │                                               │ yes      │
//!       │                         features → classify → send token │
//!       └───────────────────────────────────────────────┴──────────┘
//! ```
//!
//! Exactly one frame is consumed per loop iteration, whether or not it
//! completes a window. The decision for window *n* is written before window
//! *n + 1* is processed — per-connection work is purely sequential;
//! concurrency exists only across connections. Any protocol or collaborator
//! failure tears the connection down; there is no per-frame recovery.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn, Instrument};

use super::ServerShared;
use crate::classify::WindowVerdict;
use crate::error::{GateError, Result};
use crate::protocol::read_frame;
use crate::resample::{RateConverter, RESAMPLE_CHUNK};
use crate::window::WindowBuffer;

pub(crate) async fn handle(stream: TcpStream, peer: SocketAddr, shared: Arc<ServerShared>) {
    let span = tracing::info_span!("connection", %peer);
    async {
        info!("client connected");
        match run(stream, &shared).await {
            Ok(windows) => info!(windows, "connection closed"),
            Err(e) if e.is_protocol() => {
                shared
                    .diagnostics
                    .protocol_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "connection closed on protocol error");
            }
            Err(e) => {
                shared
                    .diagnostics
                    .collaborator_errors
                    .fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "connection closed on internal error");
            }
        }
    }
    .instrument(span)
    .await;
}

async fn run(mut stream: TcpStream, shared: &ServerShared) -> Result<u64> {
    let config = &shared.config;
    let diagnostics = &shared.diagnostics;

    let mut converter =
        RateConverter::new(config.source_rate, config.target_rate, RESAMPLE_CHUNK)?;
    let mut window = WindowBuffer::new(config.window_samples);
    let mut windows_sent = 0u64;

    loop {
        let frame = {
            let read = read_frame(&mut stream, config.max_frame_bytes);
            match config.read_timeout {
                None => read.await?,
                Some(limit) => tokio::time::timeout(limit, read)
                    .await
                    .map_err(|_| GateError::ReadTimeout)??,
            }
        };
        let Some(frame) = frame else {
            break; // clean end of stream
        };

        diagnostics.frames_in.fetch_add(1, Ordering::Relaxed);
        let samples = frame.samples()?;
        trace!(
            bytes = frame.len(),
            samples = samples.len(),
            "frame received"
        );

        let resampled = converter.process(&samples)?;
        diagnostics
            .samples_resampled
            .fetch_add(resampled.len(), Ordering::Relaxed);
        window.push(&resampled);

        let Some(full_window) = window.try_take_window() else {
            continue;
        };

        let verdict = classify_window(shared, full_window).await?;
        debug!(
            speech = verdict.speech,
            label = %verdict.urban,
            decision = %verdict.decision,
            "window classified"
        );
        diagnostics.record_verdict(&verdict);

        stream.write_all(verdict.decision.token()).await?;
        windows_sent += 1;
    }

    Ok(windows_sent)
}

/// Feature extraction and inference are CPU work; run them on the blocking
/// pool and await inline so per-connection ordering is preserved.
async fn classify_window(shared: &ServerShared, window: Vec<f32>) -> Result<WindowVerdict> {
    let extractor = Arc::clone(&shared.extractor);
    let classifiers = shared.classifiers.clone();
    tokio::task::spawn_blocking(move || {
        let features = extractor.extract(&window)?;
        classifiers.judge(&features)
    })
    .await
    .map_err(|e| GateError::Classify(format!("classification task aborted: {e}")))?
}
