//! Video stream metadata types.
//!
//! This module defines [`FrameRate`] and [`StreamMetadata`], the snapshot
//! returned by [`StreamSession::metadata`](crate::StreamSession::metadata).
//! Metadata is read once when the stream is opened and stays fixed until the
//! session is closed.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// A rational frame rate (`numerator / denominator` frames per second).
///
/// Backends should report the stream's real base frame rate here, not the
/// container's timing base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameRate {
    /// Frames counted per `denominator` seconds.
    pub numerator: i32,
    /// Seconds per `numerator` frames.
    pub denominator: i32,
}

impl FrameRate {
    /// Create a frame rate from its two terms.
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Frames per second as a float, or `0.0` when the rate is unknown.
    pub fn as_f64(self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }

    /// Returns `true` when both terms are positive.
    pub const fn is_known(self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Metadata for the video track bound to an open session.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct StreamMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Real base frame rate of the stream.
    pub frame_rate: FrameRate,
    /// Name of the decoder that was opened (e.g. `"h264"`).
    pub codec_name: String,
    /// Total number of frames. May be approximate, and `0` when unknown.
    pub frame_count: u64,
    /// Native pixel format name, when the backend reports one.
    pub pixel_format: Option<String>,
    /// Index of the bound track within the container.
    pub track_index: usize,
}

impl StreamMetadata {
    /// Frames per second as a float, or `0.0` when unknown.
    pub fn frames_per_second(&self) -> f64 {
        self.frame_rate.as_f64()
    }
}
