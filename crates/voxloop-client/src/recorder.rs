//! Audio capture seam.
//!
//! [`RecorderAdapter`] is the thin wrapper over the platform's capture
//! primitive: start, stop-with-clip, and nothing else. The orchestrator
//! owns its adapter exclusively and guarantees the device is released on
//! every path out of the recording state. [`WavFileRecorder`] is the
//! bundled implementation for environments without live capture: it
//! serves a prepared WAV file as the clip, deriving the duration from
//! the file's own header.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ClientError, Result};

/// One completed recording.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Raw encoded audio bytes, passed through untouched.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime_type: String,
    /// Elapsed capture duration.
    pub duration: Duration,
}

impl AudioClip {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Upload file name matching the clip's container format.
    pub fn upload_file_name(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/wav" | "audio/x-wav" => "chat_recording.wav",
            "audio/ogg" => "chat_recording.ogg",
            "audio/mp3" | "audio/mpeg" => "chat_recording.mp3",
            _ => "chat_recording.webm",
        }
    }
}

/// Platform capture primitive.
///
/// Implementations map platform denials onto the error taxonomy:
/// [`ClientError::PermissionDenied`], [`ClientError::NoDevice`], or
/// [`ClientError::Unsupported`] from `start`; `stop` always releases
/// the device, clip or no clip.
#[async_trait]
pub trait RecorderAdapter: Send + Sync {
    /// Acquire the device and begin capturing.
    async fn start(&mut self) -> Result<()>;

    /// Stop capturing, release the device, and return the clip.
    async fn stop(&mut self) -> Result<AudioClip>;

    /// Whether a capture is in progress.
    fn is_capturing(&self) -> bool;
}

/// Serves a prepared WAV file as the recorded clip.
///
/// `start` verifies the file exists (a missing file is the no-device
/// case); `stop` reads it and computes the duration from the WAV
/// header, so the minimum-clip guard sees real numbers.
pub struct WavFileRecorder {
    path: PathBuf,
    capturing: bool,
}

impl WavFileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capturing: false,
        }
    }
}

#[async_trait]
impl RecorderAdapter for WavFileRecorder {
    async fn start(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Err(ClientError::NoDevice(format!(
                "no clip file at {}",
                self.path.display()
            )));
        }
        self.capturing = true;
        debug!(path = %self.path.display(), "file recorder armed");
        Ok(())
    }

    async fn stop(&mut self) -> Result<AudioClip> {
        self.capturing = false;
        let data = tokio::fs::read(&self.path).await?;
        let duration = wav_duration(&data).ok_or_else(|| {
            ClientError::Unsupported(format!(
                "unrecognized audio format in {}",
                self.path.display()
            ))
        })?;
        debug!(
            path = %self.path.display(),
            bytes = data.len(),
            duration_ms = duration.as_millis() as u64,
            "file recorder produced clip"
        );
        Ok(AudioClip {
            data,
            mime_type: "audio/wav".into(),
            duration,
        })
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }
}

/// Duration of a PCM WAV file from its `fmt `/`data` chunks.
///
/// Walks the RIFF chunk list rather than assuming the canonical 44-byte
/// layout, since encoders commonly insert `LIST` or `fact` chunks.
fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<u32> = None;
    let mut data_len: Option<u32> = None;

    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().ok()?);
        let body = offset + 8;

        match id {
            b"fmt " if body + 12 <= bytes.len() => {
                byte_rate = Some(u32::from_le_bytes(
                    bytes[body + 8..body + 12].try_into().ok()?,
                ));
            }
            b"data" => {
                data_len = Some(size);
            }
            _ => {}
        }

        // Chunks are word-aligned.
        offset = body + size as usize + (size as usize & 1);
    }

    let rate = byte_rate?;
    let len = data_len?;
    if rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(f64::from(len) / f64::from(rate)))
}
