use thiserror::Error;

/// All errors produced by audiogate-core.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("stream ended inside a frame header")]
    IncompleteHeader,

    #[error("stream ended inside a frame payload: expected {expected} bytes, received {received}")]
    IncompletePayload { expected: u32, received: usize },

    #[error("frame payload of {len} bytes is not a whole number of f32 samples")]
    RaggedPayload { len: usize },

    #[error("declared frame length {declared} exceeds the configured limit of {limit} bytes")]
    FrameTooLarge { declared: u32, limit: u32 },

    #[error("timed out waiting for client data")]
    ReadTimeout,

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("feature extraction error: {0}")]
    Feature(String),

    #[error("classifier error: {0}")]
    Classify(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("model load error: {0}")]
    ModelLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GateError {
    /// Protocol violations (including abrupt socket loss) are expected under
    /// normal operation and logged at a lower level than collaborator
    /// failures, which indicate something wrong on our side.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            GateError::IncompleteHeader
                | GateError::IncompletePayload { .. }
                | GateError::RaggedPayload { .. }
                | GateError::FrameTooLarge { .. }
                | GateError::ReadTimeout
                | GateError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
