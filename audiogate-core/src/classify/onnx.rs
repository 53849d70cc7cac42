//! ONNX-backed classifiers (`ort`).
//!
//! The artifacts are scikit-learn random forests exported through skl2onnx:
//! input is a `[1, 13]` f32 tensor, the first output is an int64 label
//! tensor (some exports emit f32 scores instead — handled via argmax).
//!
//! `ort` inference takes `&mut Session`, so each classifier serializes its
//! own calls through a `parking_lot::Mutex`, satisfying the shared
//! read-only contract of [`SpeechClassifier`] / [`UrbanClassifier`] without
//! any cross-classifier coordination.

use std::path::{Path, PathBuf};

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use tracing::info;

use super::{SpeechClassifier, UrbanClassifier, UrbanLabel};
use crate::error::{GateError, Result};
use crate::features::N_MFCC;

struct OnnxClassifier {
    session: Mutex<Session>,
    path: PathBuf,
}

impl OnnxClassifier {
    /// Load a session and run one dummy inference so the first real window
    /// does not pay the warm-up cost.
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GateError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let session = SessionBuilder::new()
            .map_err(|e| GateError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| GateError::ModelLoad(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| GateError::ModelLoad(e.to_string()))?;

        let classifier = Self {
            session: Mutex::new(session),
            path: path.to_path_buf(),
        };

        classifier
            .predict_class(&[0.0; N_MFCC])
            .map_err(|e| GateError::ModelLoad(format!("warm-up inference failed: {e}")))?;

        info!(path = %classifier.path.display(), "classifier artifact loaded");
        Ok(classifier)
    }

    /// Run one inference, returning the predicted class id.
    fn predict_class(&self, features: &[f32]) -> Result<i64> {
        let input = Value::from_array((vec![1usize, features.len()], features.to_vec()))
            .map_err(|e| GateError::Classify(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| GateError::Classify(e.to_string()))?;

        // skl2onnx puts the label tensor first; fall back to argmax over
        // f32 scores for exports that emit probabilities only.
        if let Ok((_, labels)) = outputs[0].try_extract_tensor::<i64>() {
            labels
                .first()
                .copied()
                .ok_or_else(|| GateError::Classify("empty label tensor".into()))
        } else if let Ok((_, scores)) = outputs[0].try_extract_tensor::<f32>() {
            scores
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i as i64)
                .ok_or_else(|| GateError::Classify("empty score tensor".into()))
        } else {
            Err(GateError::Classify(format!(
                "unsupported output tensor type from {}",
                self.path.display()
            )))
        }
    }
}

/// Binary speech/non-speech random forest (class id 1 = speech).
pub struct OnnxSpeechClassifier(OnnxClassifier);

impl OnnxSpeechClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        OnnxClassifier::load(path.as_ref()).map(Self)
    }
}

impl SpeechClassifier for OnnxSpeechClassifier {
    fn classify(&self, features: &[f32]) -> Result<bool> {
        Ok(self.0.predict_class(features)? == 1)
    }
}

/// 10-class urban sound random forest.
pub struct OnnxUrbanClassifier(OnnxClassifier);

impl OnnxUrbanClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        OnnxClassifier::load(path.as_ref()).map(Self)
    }
}

impl UrbanClassifier for OnnxUrbanClassifier {
    fn classify(&self, features: &[f32]) -> Result<UrbanLabel> {
        let class = self.0.predict_class(features)?;
        UrbanLabel::from_index(class).ok_or_else(|| {
            GateError::Classify(format!(
                "class id {class} from {} is outside the 10-label alphabet",
                self.0.path.display()
            ))
        })
    }
}
