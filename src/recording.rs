//! Audio capture.
//!
//! A [`Recorder`] drains an [`AudioSource`] until the source ends, the user
//! stops it, the time cap passes or the size cap is exceeded. Bytes are never
//! decoded. When the size cap is exceeded capture stops with the oversized
//! payload intact so the validator can reject it instead of silently
//! truncating.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{EchoVerseError, Result};
use crate::logging::duration_millis;
use crate::models::AudioPayload;
use crate::validation::MAX_AUDIO_BYTES;

/// Longest capture allowed
pub const MAX_CAPTURE: Duration = Duration::from_secs(60);

/// Produces raw audio bytes in chunks
#[async_trait]
pub trait AudioSource: Send {
    /// Next chunk of audio, or `None` once the source is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;

    /// MIME type of the produced bytes
    fn mime_type(&self) -> &str {
        AudioPayload::DEFAULT_MIME_TYPE
    }
}

/// Adapts any async reader (file, stdin, pipe) into an [`AudioSource`]
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
    mime_type: String,
}

impl<R: AsyncRead + Unpin + Send> ReaderSource<R> {
    /// Read `reader` in 16 KiB chunks
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            chunk_size: 16 * 1024,
            mime_type: AudioPayload::DEFAULT_MIME_TYPE.to_string(),
        }
    }

    /// Override the reported MIME type
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> AudioSource for ReaderSource<R> {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0; self.chunk_size];
        let read = self.reader.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some(buf))
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// Why a capture finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source ran out of audio
    EndOfStream,
    /// The user stopped recording
    Stopped,
    /// The time cap was reached
    TimeLimit,
    /// More bytes arrived than an entry may hold
    SizeLimit,
}

/// Result of a finished capture
#[derive(Debug, Clone)]
pub struct Recording {
    /// Captured audio
    pub payload: AudioPayload,
    /// Wall time spent capturing
    pub duration: Duration,
    /// What ended the capture
    pub stop_reason: StopReason,
}

/// Capture limits
#[derive(Debug, Clone, Copy)]
pub struct Recorder {
    max_duration: Duration,
    max_bytes: usize,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            max_duration: MAX_CAPTURE,
            max_bytes: MAX_AUDIO_BYTES,
        }
    }
}

impl Recorder {
    /// Recorder with a custom time cap, never above [`MAX_CAPTURE`]
    #[must_use]
    pub fn with_max_duration(max_duration: Duration) -> Self {
        Self {
            max_duration: max_duration.min(MAX_CAPTURE),
            ..Self::default()
        }
    }

    /// Capture from `source` until it ends, `stop` resolves, or a cap is hit
    pub async fn capture<A, F>(&self, mut source: A, stop: F) -> Result<Recording>
    where
        A: AudioSource,
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let deadline = tokio::time::sleep(self.max_duration);
        tokio::pin!(deadline);
        tokio::pin!(stop);

        let mut bytes = Vec::new();
        let stop_reason = loop {
            tokio::select! {
                biased;
                () = &mut stop => break StopReason::Stopped,
                () = &mut deadline => break StopReason::TimeLimit,
                chunk = source.next_chunk() => match chunk? {
                    Some(chunk) => {
                        bytes.extend_from_slice(&chunk);
                        if bytes.len() > self.max_bytes {
                            break StopReason::SizeLimit;
                        }
                    }
                    None => break StopReason::EndOfStream,
                },
            }
        };

        let duration = started.elapsed();
        if bytes.is_empty() {
            return Err(EchoVerseError::Recording(format!(
                "no audio captured ({stop_reason:?})"
            )));
        }

        debug!(bytes = bytes.len(), ?stop_reason, "Capture finished");
        info!(
            bytes = bytes.len(),
            duration_ms = duration_millis(duration),
            "Recorded audio"
        );

        Ok(Recording {
            payload: AudioPayload {
                mime_type: source.mime_type().to_string(),
                bytes,
            },
            duration,
            stop_reason,
        })
    }
}
