//! MFCC feature extraction over one classification window.
//!
//! ## Parameterization
//!
//! 13 coefficients over a Hann-windowed power spectrogram: FFT size 512, hop
//! 256, triangular mel filterbank up to 8000 Hz, log, DCT-II (orthonormal),
//! then the coefficient matrix is averaged across time frames to a single
//! 13-dimensional vector. These parameters are what the classifier artifacts
//! were trained against; the shape and parameterization are the
//! compatibility contract, bit-exact numerics are not.

use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{GateError, Result};

/// Sample rate the classifiers were trained at (Hz).
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

/// Number of cepstral coefficients per window.
pub const N_MFCC: usize = 13;

const N_FFT: usize = 512;
const HOP_LENGTH: usize = 256;
const N_MELS: usize = 40;
const FMAX_HZ: f32 = 8_000.0;

/// A single window's feature vector.
pub type FeatureVector = [f32; N_MFCC];

/// Stateless MFCC extractor. The FFT plan, Hann window and mel filterbank
/// are built once and shared read-only across connections.
pub struct MfccExtractor {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    mel_filters: Array2<f32>,
    sample_rate: u32,
}

impl MfccExtractor {
    pub fn new(sample_rate: u32) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(N_FFT);
        let hann: Vec<f32> = (0..N_FFT)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (N_FFT - 1) as f32).cos())
            })
            .collect();
        let mel_filters = build_mel_filters(sample_rate as f32);

        Self {
            fft,
            hann,
            mel_filters,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Reduce one window of samples to its [`FeatureVector`].
    ///
    /// # Errors
    /// `GateError::Feature` if the window is shorter than one FFT frame.
    pub fn extract(&self, window: &[f32]) -> Result<FeatureVector> {
        if window.len() < N_FFT {
            return Err(GateError::Feature(format!(
                "window of {} samples is shorter than one FFT frame ({N_FFT})",
                window.len()
            )));
        }

        let spectrogram = self.power_spectrogram(window);
        let mel = self.mel_filters.dot(&spectrogram);
        let log_mel = mel.mapv(|x| (x + 1e-10).ln());
        let mfcc = dct_ii(&log_mel);

        // Average the (N_MFCC, frames) matrix across time.
        let mean = mfcc
            .mean_axis(ndarray::Axis(1))
            .ok_or_else(|| GateError::Feature("empty spectrogram".into()))?;

        let mut features = [0f32; N_MFCC];
        for (out, v) in features.iter_mut().zip(mean.iter()) {
            *out = *v;
        }
        Ok(features)
    }

    fn power_spectrogram(&self, window: &[f32]) -> Array2<f32> {
        let n_frames = (window.len() - N_FFT) / HOP_LENGTH + 1;
        let n_bins = N_FFT / 2 + 1;
        let mut spectrogram = Array2::zeros((n_bins, n_frames));

        let mut frame_buf = vec![Complex::new(0f32, 0f32); N_FFT];
        for frame_idx in 0..n_frames {
            let start = frame_idx * HOP_LENGTH;
            for (i, slot) in frame_buf.iter_mut().enumerate() {
                *slot = Complex::new(window[start + i] * self.hann[i], 0.0);
            }
            self.fft.process(&mut frame_buf);
            for (bin, value) in frame_buf.iter().take(n_bins).enumerate() {
                spectrogram[[bin, frame_idx]] = value.norm_sqr();
            }
        }

        spectrogram
    }
}

/// Triangular mel filterbank from 0 Hz up to [`FMAX_HZ`].
fn build_mel_filters(sample_rate: f32) -> Array2<f32> {
    let n_bins = N_FFT / 2 + 1;
    let mut filters = Array2::zeros((N_MELS, n_bins));

    let fmax = FMAX_HZ.min(sample_rate / 2.0);
    let mel_low = hz_to_mel(0.0);
    let mel_high = hz_to_mel(fmax);
    let bin_points: Vec<usize> = (0..N_MELS + 2)
        .map(|i| {
            let mel = mel_low + (mel_high - mel_low) * i as f32 / (N_MELS + 1) as f32;
            ((mel_to_hz(mel) * N_FFT as f32) / sample_rate).floor() as usize
        })
        .collect();

    for m in 0..N_MELS {
        let left = bin_points[m];
        let center = bin_points[m + 1];
        let right = bin_points[m + 2];

        for k in left..=right.min(n_bins - 1) {
            // Adjacent edges can land on the same bin at the low end; a
            // degenerate slope contributes nothing.
            if k <= center && center > left {
                filters[[m, k]] = (k - left) as f32 / (center - left) as f32;
            } else if k > center && right > center {
                filters[[m, k]] = (right - k) as f32 / (right - center) as f32;
            }
        }
    }

    filters
}

/// Orthonormal DCT-II over the mel axis, keeping the first [`N_MFCC`] rows.
fn dct_ii(log_mel: &Array2<f32>) -> Array2<f32> {
    let (n_mels, n_frames) = log_mel.dim();
    let mut mfcc = Array2::zeros((N_MFCC, n_frames));

    let scale0 = (1.0 / n_mels as f32).sqrt();
    let scale = (2.0 / n_mels as f32).sqrt();

    for frame in 0..n_frames {
        for i in 0..N_MFCC {
            let mut sum = 0.0;
            for j in 0..n_mels {
                sum += log_mel[[j, frame]]
                    * (std::f32::consts::PI * i as f32 * (j as f32 + 0.5) / n_mels as f32).cos();
            }
            mfcc[[i, frame]] = sum * if i == 0 { scale0 } else { scale };
        }
    }

    mfcc
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WINDOW_SAMPLES;
    use approx::assert_relative_eq;

    fn sine(freq: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / MODEL_SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    #[test]
    fn output_is_finite_and_deterministic() {
        let extractor = MfccExtractor::new(MODEL_SAMPLE_RATE);
        let window = sine(440.0, WINDOW_SAMPLES);
        let a = extractor.extract(&window).unwrap();
        let b = extractor.extract(&window).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!(x.is_finite());
            assert_relative_eq!(x, y);
        }
    }

    #[test]
    fn distinct_signals_produce_distinct_features() {
        let extractor = MfccExtractor::new(MODEL_SAMPLE_RATE);
        let low = extractor.extract(&sine(200.0, WINDOW_SAMPLES)).unwrap();
        let high = extractor.extract(&sine(3_000.0, WINDOW_SAMPLES)).unwrap();
        let diff: f32 = low
            .iter()
            .zip(high.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 1e-3, "expected distinct features, total diff={diff}");
    }

    #[test]
    fn silence_is_a_valid_window() {
        let extractor = MfccExtractor::new(MODEL_SAMPLE_RATE);
        let features = extractor.extract(&vec![0.0; WINDOW_SAMPLES]).unwrap();
        assert!(features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn short_window_is_rejected() {
        let extractor = MfccExtractor::new(MODEL_SAMPLE_RATE);
        let err = extractor.extract(&vec![0.0; N_FFT - 1]).unwrap_err();
        assert!(matches!(err, GateError::Feature(_)));
    }

    #[test]
    fn filterbank_rows_are_normalized_slopes() {
        let filters = build_mel_filters(MODEL_SAMPLE_RATE as f32);
        for value in filters.iter() {
            assert!((0.0..=1.0).contains(value));
        }
        // At least the upper filters must have non-zero support.
        let total: f32 = filters.iter().sum();
        assert!(total > 0.0);
    }
}
