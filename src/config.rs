//! Session configuration.
//!
//! [`SessionOptions`] is a builder that carries the tunable seek policy and
//! the output channel order into a [`StreamSession`](crate::StreamSession)
//! without widening every method signature.
//!
//! # Example
//!
//! ```
//! use frameseek::{ChannelOrder, SessionOptions};
//!
//! let options = SessionOptions::new()
//!     .with_forward_decode_threshold(12)
//!     .with_max_reseek_attempts(2)
//!     .with_channel_order(ChannelOrder::Bgr);
//! assert_eq!(options.forward_decode_threshold(), 12);
//! ```

/// Byte order of the packed 24-bit output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelOrder {
    /// Red, green, blue. This is the default.
    #[default]
    Rgb,
    /// Blue, green, red, as expected by most Windows bitmap APIs.
    Bgr,
}

impl ChannelOrder {
    /// Byte offsets of the red, green and blue channels within one pixel.
    pub(crate) const fn offsets(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        }
    }
}

/// Tunable behaviour of a [`StreamSession`](crate::StreamSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Largest forward distance, in frames, that `seek_frame` covers by
    /// decoding sequentially instead of issuing a keyframe seek.
    pub(crate) forward_decode_threshold: i64,
    /// How many times `seek_frame` may re-seek after overshooting a target
    /// whose frame had already been consumed.
    pub(crate) max_reseek_attempts: u32,
    /// Byte order of output pixels.
    pub(crate) channel_order: ChannelOrder,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    /// Create options with the default policy.
    ///
    /// Defaults: forward threshold of 5 frames, 3 re-seek attempts, RGB
    /// output.
    pub const fn new() -> Self {
        Self {
            forward_decode_threshold: 5,
            max_reseek_attempts: 3,
            channel_order: ChannelOrder::Rgb,
        }
    }

    /// Set the forward distance handled by sequential decode.
    ///
    /// Negative values are clamped to zero, which makes every non-zero
    /// seek go through the backend.
    #[must_use]
    pub fn with_forward_decode_threshold(mut self, frames: i64) -> Self {
        self.forward_decode_threshold = frames.max(0);
        self
    }

    /// Set the cap on overshoot re-seeks. Zero disables re-seeking.
    #[must_use]
    pub const fn with_max_reseek_attempts(mut self, attempts: u32) -> Self {
        self.max_reseek_attempts = attempts;
        self
    }

    /// Set the byte order of output pixels.
    #[must_use]
    pub const fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    /// The forward distance handled by sequential decode.
    pub const fn forward_decode_threshold(&self) -> i64 {
        self.forward_decode_threshold
    }

    /// The cap on overshoot re-seeks.
    pub const fn max_reseek_attempts(&self) -> u32 {
        self.max_reseek_attempts
    }

    /// The byte order of output pixels.
    pub const fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }
}
