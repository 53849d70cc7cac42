//! Fixed-size classification windows over the resampled sample stream.
//!
//! ## Policy
//!
//! 1. After every push, if more than `window_len` samples are retained, only
//!    the newest `window_len` are kept — the oldest excess is dropped.
//! 2. Once at least `window_len` samples are retained, the full retained
//!    buffer is emitted as one window and the buffer resets to empty.
//! 3. Below `window_len`, samples simply accumulate.
//!
//! Windows are therefore non-overlapping and reset-after-emit: no tail is
//! carried across emissions, and when more than a window's worth of audio
//! arrives between emissions the older samples are silently discarded. This
//! matches the deployed behavior exactly. It is not a true sliding window —
//! replacing it with one would change classification cadence and results.

/// Samples per classification window at the 16 kHz model rate (100 ms).
pub const WINDOW_SAMPLES: usize = 1600;

/// Per-connection sample accumulator. Owned by exactly one connection
/// handler; never shared.
#[derive(Debug)]
pub struct WindowBuffer {
    samples: Vec<f32>,
    window_len: usize,
}

impl WindowBuffer {
    pub fn new(window_len: usize) -> Self {
        Self {
            samples: Vec::with_capacity(window_len),
            window_len,
        }
    }

    /// Append samples, then drop the oldest excess beyond one window.
    pub fn push(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
        if self.samples.len() > self.window_len {
            let excess = self.samples.len() - self.window_len;
            self.samples.drain(..excess);
        }
    }

    /// Emit a full window if one is available, resetting the buffer to empty.
    pub fn try_take_window(&mut self) -> Option<Vec<f32>> {
        if self.samples.len() < self.window_len {
            return None;
        }
        // push() truncation guarantees we hold exactly one window here.
        debug_assert_eq!(self.samples.len(), self.window_len);
        Some(std::mem::replace(
            &mut self.samples,
            Vec::with_capacity(self.window_len),
        ))
    }

    /// Samples currently buffered (always ≤ the window length after a push).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::new(WINDOW_SAMPLES)
    }
}
