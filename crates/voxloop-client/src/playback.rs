//! Audio playback seam.
//!
//! [`PlaybackSink::play`] resolves when playback has finished, which is
//! what sequences conversation-mode auto-continue after the reply has
//! actually been heard. The bundled sinks don't drive a speaker: they
//! either discard the audio ([`NullPlayback`]) or materialize it to a
//! directory ([`SaveToDirPlayback`]) for an external player.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// What to play: a backend-hosted URL or raw bytes.
#[derive(Debug, Clone)]
pub enum PlaybackSource {
    Url(String),
    Bytes { data: Vec<u8>, mime_type: String },
}

/// Playback device seam.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play the source to completion.
    async fn play(&self, source: PlaybackSource) -> Result<()>;
}

/// Discards audio. Useful headless and in tests.
pub struct NullPlayback;

#[async_trait]
impl PlaybackSink for NullPlayback {
    async fn play(&self, source: PlaybackSource) -> Result<()> {
        match source {
            PlaybackSource::Url(url) => debug!(url = %url, "playback skipped"),
            PlaybackSource::Bytes { data, .. } => {
                debug!(bytes = data.len(), "playback skipped")
            }
        }
        Ok(())
    }
}

/// Fetches/writes reply audio into a directory and logs where it went.
pub struct SaveToDirPlayback {
    dir: PathBuf,
    http: reqwest::Client,
}

impl SaveToDirPlayback {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            http: reqwest::Client::new(),
        }
    }

    fn target_path(&self, extension: &str) -> PathBuf {
        let stamp = chrono::Utc::now().timestamp_millis();
        self.dir.join(format!("reply_{stamp}.{extension}"))
    }

    fn extension_for_mime(mime_type: &str) -> &'static str {
        match mime_type.split(';').next().unwrap_or("") {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" => "ogg",
            "audio/webm" => "webm",
            _ => "bin",
        }
    }

    fn extension_for_url(url: &str) -> &str {
        url.rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp3")
    }
}

#[async_trait]
impl PlaybackSink for SaveToDirPlayback {
    async fn play(&self, source: PlaybackSource) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let (bytes, extension) = match source {
            PlaybackSource::Url(url) => {
                let response = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| {
                        ClientError::NetworkTransport(format!("audio fetch failed: {e}"))
                    })?;
                let extension = Self::extension_for_url(&url).to_string();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| {
                        ClientError::NetworkTransport(format!("audio fetch failed: {e}"))
                    })?
                    .to_vec();
                (bytes, extension)
            }
            PlaybackSource::Bytes { data, mime_type } => {
                (data, Self::extension_for_mime(&mime_type).to_string())
            }
        };

        let path = self.target_path(&extension);
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "reply audio saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_playback_accepts_anything() {
        let sink = NullPlayback;
        sink.play(PlaybackSource::Url("http://x/a.mp3".into()))
            .await
            .unwrap();
        sink.play(PlaybackSource::Bytes {
            data: vec![1, 2, 3],
            mime_type: "audio/wav".into(),
        })
        .await
        .unwrap();
    }

    #[test]
    fn extension_from_mime() {
        assert_eq!(SaveToDirPlayback::extension_for_mime("audio/mpeg"), "mp3");
        assert_eq!(SaveToDirPlayback::extension_for_mime("audio/wav"), "wav");
        assert_eq!(
            SaveToDirPlayback::extension_for_mime("audio/webm;codecs=opus"),
            "webm"
        );
        assert_eq!(SaveToDirPlayback::extension_for_mime("video/mp4"), "bin");
    }

    #[test]
    fn extension_from_url() {
        assert_eq!(
            SaveToDirPlayback::extension_for_url("https://cdn.example/audio/a.mp3"),
            "mp3"
        );
        assert_eq!(
            SaveToDirPlayback::extension_for_url("https://cdn.example/a.wav"),
            "wav"
        );
        // No usable extension: default to mp3, the backend's format.
        assert_eq!(
            SaveToDirPlayback::extension_for_url("https://cdn.example/stream"),
            "mp3"
        );
    }

    #[tokio::test]
    async fn save_playback_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SaveToDirPlayback::new(dir.path().join("audio"));
        sink.play(PlaybackSource::Bytes {
            data: vec![9; 128],
            mime_type: "audio/mpeg".into(),
        })
        .await
        .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("audio"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].extension().unwrap(), "mp3");
        assert_eq!(std::fs::read(&entries[0]).unwrap().len(), 128);
    }
}
