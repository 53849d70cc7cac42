//! Classifier abstraction.
//!
//! The two traits decouple the connection pipeline from any specific backend
//! (ONNX random forests in production, fixed-output stubs in tests). Both
//! contracts take `&self`: the artifacts are immutable after load and shared
//! read-only across every connection, so implementations must either be
//! reentrant or serialize access internally (the ONNX backend holds its
//! session behind a `parking_lot::Mutex`).

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxSpeechClassifier, OnnxUrbanClassifier};

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::protocol::Decision;

/// The ten UrbanSound categories, in artifact class-id order (0–9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrbanLabel {
    AirConditioner,
    CarHorn,
    ChildrenPlaying,
    DogBark,
    Drilling,
    EngineIdling,
    GunShot,
    Jackhammer,
    Siren,
    StreetMusic,
}

impl UrbanLabel {
    pub const ALL: [UrbanLabel; 10] = [
        UrbanLabel::AirConditioner,
        UrbanLabel::CarHorn,
        UrbanLabel::ChildrenPlaying,
        UrbanLabel::DogBark,
        UrbanLabel::Drilling,
        UrbanLabel::EngineIdling,
        UrbanLabel::GunShot,
        UrbanLabel::Jackhammer,
        UrbanLabel::Siren,
        UrbanLabel::StreetMusic,
    ];

    /// Map a model class id to its label.
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrbanLabel::AirConditioner => "air_conditioner",
            UrbanLabel::CarHorn => "car_horn",
            UrbanLabel::ChildrenPlaying => "children_playing",
            UrbanLabel::DogBark => "dog_bark",
            UrbanLabel::Drilling => "drilling",
            UrbanLabel::EngineIdling => "engine_idling",
            UrbanLabel::GunShot => "gun_shot",
            UrbanLabel::Jackhammer => "jackhammer",
            UrbanLabel::Siren => "siren",
            UrbanLabel::StreetMusic => "street_music",
        }
    }
}

impl std::fmt::Display for UrbanLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary speech/non-speech contract.
pub trait SpeechClassifier: Send + Sync + 'static {
    fn classify(&self, features: &[f32]) -> Result<bool>;
}

/// 10-class urban sound contract.
pub trait UrbanClassifier: Send + Sync + 'static {
    fn classify(&self, features: &[f32]) -> Result<UrbanLabel>;
}

/// The two pre-trained artifacts, loaded once at startup and injected into
/// the listener — shared read-only by every connection task.
#[derive(Clone)]
pub struct ClassifierPair {
    speech: Arc<dyn SpeechClassifier>,
    urban: Arc<dyn UrbanClassifier>,
}

impl ClassifierPair {
    pub fn new(speech: Arc<dyn SpeechClassifier>, urban: Arc<dyn UrbanClassifier>) -> Self {
        Self { speech, urban }
    }

    /// Run both classifiers over one feature vector.
    ///
    /// The speech flag is a side observation (logged, counted) — the routing
    /// decision is a pure function of the urban label alone.
    pub fn judge(&self, features: &[f32]) -> Result<WindowVerdict> {
        let speech = self.speech.classify(features)?;
        let urban = self.urban.classify(features)?;
        Ok(WindowVerdict {
            speech,
            urban,
            decision: decide(urban),
        })
    }
}

impl std::fmt::Debug for ClassifierPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierPair").finish_non_exhaustive()
    }
}

/// Per-window outcome: both observed labels plus the routing decision.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WindowVerdict {
    pub speech: bool,
    pub urban: UrbanLabel,
    pub decision: Decision,
}

/// Routing policy: only safety-relevant sounds pass, everything else is
/// muted. The speech flag is deliberately not an input here.
pub fn decide(label: UrbanLabel) -> Decision {
    match label {
        UrbanLabel::Siren | UrbanLabel::CarHorn => Decision::Pass,
        _ => Decision::Mute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_siren_and_car_horn_pass() {
        for label in UrbanLabel::ALL {
            let expected = match label {
                UrbanLabel::Siren | UrbanLabel::CarHorn => Decision::Pass,
                _ => Decision::Mute,
            };
            assert_eq!(decide(label), expected, "label {label}");
        }
    }

    #[test]
    fn speech_flag_never_affects_the_decision() {
        for label in UrbanLabel::ALL {
            for speech in [false, true] {
                let pair = stub::fixed_pair(speech, label);
                let verdict = pair.judge(&[0.0; 13]).unwrap();
                assert_eq!(verdict.decision, decide(label));
                assert_eq!(verdict.speech, speech);
            }
        }
    }

    #[test]
    fn class_id_mapping_round_trips() {
        for (i, label) in UrbanLabel::ALL.iter().enumerate() {
            assert_eq!(UrbanLabel::from_index(i as i64), Some(*label));
        }
        assert_eq!(UrbanLabel::from_index(10), None);
        assert_eq!(UrbanLabel::from_index(-1), None);
    }

    #[test]
    fn labels_serialize_in_snake_case() {
        assert_eq!(
            serde_json::to_value(UrbanLabel::AirConditioner).unwrap(),
            serde_json::json!("air_conditioner")
        );
        assert_eq!(UrbanLabel::GunShot.as_str(), "gun_shot");
    }
}
