//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! Clients stream at the fixed 48 kHz wire rate; the classifiers were trained
//! on 16 kHz audio. `RateConverter` bridges that gap on the per-connection
//! task, where allocation is fine. Rubato wants fixed-size input blocks, so
//! incoming samples are accumulated internally until a full block is
//! available; any remainder is kept for the next call. The produced length
//! per call may deviate from the ideal ratio by a few samples — the
//! windowing policy downstream absorbs that.
//!
//! When source rate == target rate the converter is a passthrough and no
//! rubato session is created at all.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{GateError, Result};

/// Input block size fed to rubato per process call (20 ms at 48 kHz).
pub const RESAMPLE_CHUNK: usize = 960;

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Accumulation buffer — holds partial input blocks between calls.
    input_buf: Vec<f32>,
    /// How many input samples rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Create a new converter.
    ///
    /// # Errors
    /// Returns `GateError::Resample` if rubato fails to initialise.
    pub fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio — no dynamic adjustment
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| GateError::Resample(format!("init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
        })
    }

    /// Process incoming samples, returning resampled output (may be empty
    /// while rubato's input block is still filling).
    ///
    /// In passthrough mode (same rates), input is returned directly.
    ///
    /// # Errors
    /// A rubato processing failure is a collaborator error and fatal to the
    /// connection that owns this converter.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(samples.to_vec());
        };

        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];

            let (_consumed, produced) = resampler
                .process_into_buffer(&[input_slice], &mut self.output_buf, None)
                .map_err(|e| GateError::Resample(e.to_string()))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);

            self.input_buf.drain(..self.chunk_size);
        }

        Ok(result)
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_identity() {
        let mut rc = RateConverter::new(16_000, 16_000, RESAMPLE_CHUNK).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        let out = rc.process(&samples).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn ratio_48k_to_16k_correct_length() {
        let mut rc = RateConverter::new(48_000, 16_000, RESAMPLE_CHUNK).unwrap();
        assert!(!rc.is_passthrough());
        // 960 input samples at 48 kHz → ~320 at 16 kHz
        let samples = vec![0.0f32; 960];
        let out = rc.process(&samples).unwrap();
        assert!(!out.is_empty(), "expected non-empty output");
        let expected = 320usize;
        assert!(
            (out.len() as isize - expected as isize).unsigned_abs() <= 10,
            "output len={} expected≈{}",
            out.len(),
            expected
        );
    }

    #[test]
    fn partial_block_returns_empty() {
        let mut rc = RateConverter::new(48_000, 16_000, RESAMPLE_CHUNK).unwrap();
        // Fewer than chunk_size samples → nothing output yet
        let out = rc.process(&vec![0.0f32; 500]).unwrap();
        assert!(
            out.is_empty(),
            "expected empty output for partial block, got {}",
            out.len()
        );
    }

    #[test]
    fn partial_blocks_accumulate_across_calls() {
        let mut rc = RateConverter::new(48_000, 16_000, RESAMPLE_CHUNK).unwrap();
        // Two 500-sample pushes = 1000 total ≥ 960 chunk_size → output
        let out1 = rc.process(&vec![0.0f32; 500]).unwrap();
        assert!(out1.is_empty());
        let out2 = rc.process(&vec![0.0f32; 500]).unwrap();
        assert!(!out2.is_empty(), "second push should trigger processing");
    }

    #[test]
    fn full_client_frame_yields_roughly_one_window() {
        // The reference client sends 4800 samples (100 ms) per frame; at a
        // 3:1 ratio that is ~1600 resampled samples.
        let mut rc = RateConverter::new(48_000, 16_000, RESAMPLE_CHUNK).unwrap();
        use approx::assert_relative_eq;
        let samples: Vec<f32> = (0..4800)
            .map(|i| (i as f32 * 0.01).sin() * 0.5)
            .collect();
        let out = rc.process(&samples).unwrap();
        assert_relative_eq!(out.len() as f32, 1600.0, max_relative = 0.05);
    }
}
