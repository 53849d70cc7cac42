//! Server settings: optional JSON file plus `AUDIOGATE_*` environment
//! overrides. Environment wins over the file; the file wins over defaults.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use audiogate_core::ServerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub speech_model: PathBuf,
    pub urban_model: PathBuf,
    /// Reject frames declaring more than this many payload bytes.
    /// Unset preserves the deployed unbounded behavior.
    pub max_frame_bytes: Option<u32>,
    /// Per-frame read timeout in milliseconds. Unset means no timeout.
    pub read_timeout_ms: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5050".into(),
            speech_model: PathBuf::from("models/speech_rf.onnx"),
            urban_model: PathBuf::from("models/urban_rf.onnx"),
            max_frame_bytes: None,
            read_timeout_ms: None,
        }
    }
}

impl ServerSettings {
    pub fn normalize(&mut self) {
        self.bind_addr = self.bind_addr.trim().to_string();
        if self.bind_addr.is_empty() {
            self.bind_addr = Self::default().bind_addr;
        }
    }

    /// Translate into the core server config.
    pub fn server_config(&self) -> Result<ServerConfig> {
        let bind_addr: SocketAddr = self
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind address {:?}", self.bind_addr))?;
        Ok(ServerConfig {
            bind_addr,
            max_frame_bytes: self.max_frame_bytes,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            ..ServerConfig::default()
        })
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("AUDIOGATE_BIND") {
            self.bind_addr = v;
        }
        if let Some(v) = var("AUDIOGATE_SPEECH_MODEL") {
            self.speech_model = PathBuf::from(v);
        }
        if let Some(v) = var("AUDIOGATE_URBAN_MODEL") {
            self.urban_model = PathBuf::from(v);
        }
        if let Some(v) = var("AUDIOGATE_MAX_FRAME_BYTES") {
            self.max_frame_bytes = v.parse().ok();
        }
        if let Some(v) = var("AUDIOGATE_READ_TIMEOUT_MS") {
            self.read_timeout_ms = v.parse().ok();
        }
    }
}

/// Load settings from `path` if given and present, otherwise defaults, then
/// apply environment overrides. A present but unparsable file is an error,
/// not a silent fallback.
pub fn load_settings(path: Option<&Path>) -> Result<ServerSettings> {
    let mut settings = match path {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing settings file {}", path.display()))?
        }
        _ => ServerSettings::default(),
    };
    settings.apply_env_overrides();
    settings.normalize();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_deployment() {
        let settings = ServerSettings::default();
        assert_eq!(settings.bind_addr, "127.0.0.1:5050");
        assert!(settings.max_frame_bytes.is_none());
        assert!(settings.read_timeout_ms.is_none());
        let config = settings.server_config().unwrap();
        assert_eq!(config.bind_addr.port(), 5050);
        assert!(config.read_timeout.is_none());
    }

    #[test]
    fn settings_parse_from_camel_case_json() {
        let settings: ServerSettings = serde_json::from_str(
            r#"{
                "bindAddr": "0.0.0.0:6000",
                "urbanModel": "artifacts/urban.onnx",
                "maxFrameBytes": 1048576,
                "readTimeoutMs": 30000
            }"#,
        )
        .unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:6000");
        assert_eq!(settings.urban_model, PathBuf::from("artifacts/urban.onnx"));
        // Omitted fields fall back to defaults.
        assert_eq!(settings.speech_model, ServerSettings::default().speech_model);
        let config = settings.server_config().unwrap();
        assert_eq!(config.max_frame_bytes, Some(1_048_576));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut settings = ServerSettings::default();
        settings.apply_overrides(|key| match key {
            "AUDIOGATE_BIND" => Some("127.0.0.1:7000".into()),
            "AUDIOGATE_MAX_FRAME_BYTES" => Some("4096".into()),
            _ => None,
        });
        assert_eq!(settings.bind_addr, "127.0.0.1:7000");
        assert_eq!(settings.max_frame_bytes, Some(4096));
        assert_eq!(settings.read_timeout_ms, None);
    }

    #[test]
    fn blank_bind_addr_normalizes_to_default() {
        let mut settings = ServerSettings {
            bind_addr: "   ".into(),
            ..ServerSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.bind_addr, "127.0.0.1:5050");
    }

    #[test]
    fn invalid_bind_addr_is_an_error() {
        let settings = ServerSettings {
            bind_addr: "not-an-address".into(),
            ..ServerSettings::default()
        };
        assert!(settings.server_config().is_err());
    }
}
