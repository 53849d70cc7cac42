//! Fixed-output classifiers for tests and development runs.
//!
//! Both count invocations so tests can assert that exactly one
//! classification happens per completed window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{ClassifierPair, SpeechClassifier, UrbanClassifier, UrbanLabel};
use crate::error::Result;

/// Always answers with the same speech flag.
#[derive(Debug, Default)]
pub struct FixedSpeech {
    answer: bool,
    calls: AtomicUsize,
}

impl FixedSpeech {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SpeechClassifier for FixedSpeech {
    fn classify(&self, _features: &[f32]) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.answer)
    }
}

/// Always answers with the same urban label.
#[derive(Debug)]
pub struct FixedUrban {
    answer: UrbanLabel,
    calls: AtomicUsize,
}

impl FixedUrban {
    pub fn new(answer: UrbanLabel) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl UrbanClassifier for FixedUrban {
    fn classify(&self, _features: &[f32]) -> Result<UrbanLabel> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.answer)
    }
}

/// Convenience: a pair of fixed classifiers.
pub fn fixed_pair(speech: bool, urban: UrbanLabel) -> ClassifierPair {
    ClassifierPair::new(
        Arc::new(FixedSpeech::new(speech)),
        Arc::new(FixedUrban::new(urban)),
    )
}
