//! Wire protocol: length-prefixed audio frames in, bare decision tokens out.
//!
//! ## Framing
//!
//! A request frame is a `u32` little-endian byte count followed by exactly
//! that many bytes of little-endian f32 PCM, mono, at [`SOURCE_SAMPLE_RATE`].
//! Responses are *not* framed: each completed classification window yields a
//! bare ASCII token, `pass` or `mute`, with no prefix and no terminator.
//! Deployed clients depend on this asymmetry — do not add response framing.
//!
//! ## Length limits
//!
//! No maximum frame length is enforced by default; the declared length is
//! attacker-controlled and sized allocations follow it. Deployments that need
//! a bound set [`ServerConfig::max_frame_bytes`](crate::server::ServerConfig).

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{GateError, Result};

/// Sample rate every client streams at (Hz). Fixed by the wire contract;
/// there is no negotiation.
pub const SOURCE_SAMPLE_RATE: u32 = 48_000;

/// One length-prefixed unit of raw audio received from a client.
#[derive(Debug, Clone)]
pub struct Frame {
    payload: Vec<u8>,
}

impl Frame {
    pub fn from_payload(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Reinterpret the payload as little-endian f32 PCM samples.
    ///
    /// # Errors
    /// `RaggedPayload` if the byte count is not a multiple of four.
    pub fn samples(&self) -> Result<Vec<f32>> {
        if self.payload.len() % 4 != 0 {
            return Err(GateError::RaggedPayload {
                len: self.payload.len(),
            });
        }
        Ok(self
            .payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Frame a sample slice for the wire (client side: length prefix + PCM).
    pub fn encode(samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + samples.len() * 4);
        out.extend_from_slice(&((samples.len() * 4) as u32).to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` on a clean end of stream — EOF exactly at a frame
/// boundary. EOF after one to three header bytes is `IncompleteHeader`;
/// EOF inside the payload is `IncompletePayload`. Both are connection-fatal:
/// there is no partial-frame recovery.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: Option<u32>) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(GateError::IncompleteHeader)
            };
        }
        filled += n;
    }

    let declared = u32::from_le_bytes(header);
    if let Some(limit) = max_frame_bytes {
        if declared > limit {
            return Err(GateError::FrameTooLarge { declared, limit });
        }
    }

    let mut payload = vec![0u8; declared as usize];
    let mut received = 0;
    while received < payload.len() {
        let n = reader.read(&mut payload[received..]).await?;
        if n == 0 {
            return Err(GateError::IncompletePayload {
                expected: declared,
                received,
            });
        }
        received += n;
    }

    Ok(Some(Frame::from_payload(payload)))
}

/// The server's per-window routing verdict, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Forward the window to the listener — a safety-relevant sound.
    Pass,
    /// Suppress the window — background noise.
    Mute,
}

impl Decision {
    /// Wire form: bare ASCII token, no prefix or terminator.
    pub fn token(self) -> &'static [u8] {
        match self {
            Decision::Pass => b"pass",
            Decision::Mute => b"mute",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Pass => "pass",
            Decision::Mute => "mute",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clean_eof_at_frame_boundary() {
        let mut reader: &[u8] = &[];
        let frame = read_frame(&mut reader, None).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn eof_inside_header_is_fatal() {
        let mut reader: &[u8] = &[0x10, 0x00];
        let err = read_frame(&mut reader, None).await.unwrap_err();
        assert!(matches!(err, GateError::IncompleteHeader));
    }

    #[tokio::test]
    async fn eof_inside_payload_is_fatal() {
        // Declares 8 bytes, delivers 3.
        let mut bytes = 8u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut reader: &[u8] = &bytes;
        let err = read_frame(&mut reader, None).await.unwrap_err();
        match err {
            GateError::IncompletePayload { expected, received } => {
                assert_eq!(expected, 8);
                assert_eq!(received, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_length_frame_is_valid() {
        let bytes = 0u32.to_le_bytes();
        let mut reader: &[u8] = &bytes;
        let frame = read_frame(&mut reader, None).await.unwrap().unwrap();
        assert!(frame.is_empty());
        assert!(frame.samples().unwrap().is_empty());
    }

    #[tokio::test]
    async fn encode_decode_round_trip() {
        let samples = [0.0f32, -1.0, 0.5, 3.25];
        let bytes = Frame::encode(&samples);
        let mut reader: &[u8] = &bytes;
        let frame = read_frame(&mut reader, None).await.unwrap().unwrap();
        assert_eq!(frame.samples().unwrap(), samples);
        // Reader fully consumed: the next read is a clean EOF.
        assert!(read_frame(&mut reader, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ragged_payload_rejected() {
        let mut bytes = 6u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 6]);
        let mut reader: &[u8] = &bytes;
        let frame = read_frame(&mut reader, None).await.unwrap().unwrap();
        assert!(matches!(
            frame.samples().unwrap_err(),
            GateError::RaggedPayload { len: 6 }
        ));
    }

    #[tokio::test]
    async fn oversized_declaration_rejected_when_limited() {
        let mut bytes = 4096u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0; 16]);
        let mut reader: &[u8] = &bytes;
        let err = read_frame(&mut reader, Some(1024)).await.unwrap_err();
        assert!(matches!(
            err,
            GateError::FrameTooLarge {
                declared: 4096,
                limit: 1024
            }
        ));
    }

    #[tokio::test]
    async fn oversized_declaration_allowed_without_limit() {
        let mut bytes = 4096u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&vec![0u8; 4096]);
        let mut reader: &[u8] = &bytes;
        let frame = read_frame(&mut reader, None).await.unwrap().unwrap();
        assert_eq!(frame.len(), 4096);
    }

    #[test]
    fn decision_tokens_are_bare_ascii() {
        assert_eq!(Decision::Pass.token(), b"pass");
        assert_eq!(Decision::Mute.token(), b"mute");
        assert_eq!(Decision::Pass.to_string(), "pass");
    }

    #[test]
    fn decision_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Decision::Mute).unwrap(),
            serde_json::json!("mute")
        );
    }
}
