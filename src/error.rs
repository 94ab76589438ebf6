//! Error types for the `frameseek` crate.
//!
//! This module defines [`FrameSeekError`], the unified error type returned by
//! every fallible session operation, and [`BackendError`], the narrow error
//! type decoding backends report through the capability traits in
//! [`crate::backend`].
//!
//! End-of-stream is never an error: read operations report it as `Ok(None)`
//! and seek operations as `Ok(false)`.

use std::{io::Error as IoError, path::PathBuf};

use image::ImageError;
use thiserror::Error;

/// The unified error type for all `frameseek` operations.
///
/// Open-time variants ([`Open`](FrameSeekError::Open),
/// [`NoVideoTrack`](FrameSeekError::NoVideoTrack),
/// [`CodecUnavailable`](FrameSeekError::CodecUnavailable),
/// [`ConversionInit`](FrameSeekError::ConversionInit)) leave the session
/// closed. [`Decode`](FrameSeekError::Decode) is surfaced as soon as the
/// backend reports it and is never retried. After a
/// [`Seek`](FrameSeekError::Seek) error the session stays usable for
/// sequential reads from its last good position.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameSeekError {
    /// The container could not be opened or its stream info is unavailable.
    #[error("Failed to open video at {path}: {reason}")]
    Open {
        /// Path that was passed to [`crate::StreamSession::open`].
        path: PathBuf,
        /// Underlying reason reported by the backend.
        reason: String,
    },

    /// The container has no track classified as video.
    #[error("No video track found in file")]
    NoVideoTrack,

    /// No decoder is available, or it could not be opened, for the track.
    #[error("Codec {codec} is unavailable: {reason}")]
    CodecUnavailable {
        /// Codec identity reported by the container.
        codec: String,
        /// Underlying reason reported by the backend.
        reason: String,
    },

    /// The pixel-format conversion context could not be constructed.
    #[error("Cannot initialize frame conversion: {0}")]
    ConversionInit(String),

    /// The decoder rejected the stream mid-way.
    #[error("Failed to decode video frame: {0}")]
    Decode(String),

    /// A seek failed or left the session in an inconsistent position.
    #[error("Failed to seek to frame {target}: {reason}")]
    Seek {
        /// The frame that was requested.
        target: i64,
        /// What went wrong.
        reason: String,
    },

    /// Converting a decoded picture into the output buffer failed.
    #[error("Failed to convert decoded frame: {0}")]
    Conversion(String),

    /// The operation needs an open session.
    #[error("Cannot read video frames since no video is open")]
    NotOpen,

    /// An output buffer does not match the session's dimensions.
    #[error(
        "Output buffer is {actual_width}x{actual_height} but the video is {expected_width}x{expected_height}"
    )]
    BufferMismatch {
        /// Width of the open video.
        expected_width: u32,
        /// Height of the open video.
        expected_height: u32,
        /// Width of the supplied buffer.
        actual_width: u32,
        /// Height of the supplied buffer.
        actual_height: u32,
    },

    /// A row stride smaller than `width * 3` was requested.
    #[error("Row stride {stride} is smaller than the minimum of {minimum} bytes")]
    InvalidStride {
        /// The requested stride.
        stride: usize,
        /// The smallest stride that fits one packed row.
        minimum: usize,
    },

    /// An I/O error occurred while writing output files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate while saving a frame.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),
}

/// An error reported by a decoding backend.
///
/// Backends only describe what failed; the session decides which
/// [`FrameSeekError`] variant the failure maps to based on the operation
/// that was in progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    /// Create a backend error from a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message the backend reported.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for BackendError {
    fn from(error: ffmpeg_next::Error) -> Self {
        BackendError::new(error.to_string())
    }
}
