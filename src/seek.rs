//! Keyframe and frame-accurate seeking.
//!
//! Backends only seek to keyframes. [`FrameSeeker`] combines that coarse
//! seek with forward decoding to land exactly on a requested frame, and
//! skips the coarse seek entirely for short forward hops.

use std::cmp::Ordering;

use crate::{
    backend::{Demuxer, PictureDecoder},
    config::SessionOptions,
    decode::FrameDecodeLoop,
    error::FrameSeekError,
};

pub(crate) struct FrameSeeker<'a, D: Demuxer, P: PictureDecoder> {
    decode: &'a mut FrameDecodeLoop<D, P>,
    options: &'a SessionOptions,
}

impl<'a, D: Demuxer, P: PictureDecoder> FrameSeeker<'a, D, P> {
    pub(crate) fn new(decode: &'a mut FrameDecodeLoop<D, P>, options: &'a SessionOptions) -> Self {
        Self { decode, options }
    }

    /// Position the session so that the next fetch yields frame `target`.
    ///
    /// Returns `Ok(false)` when the stream ended before `target` decoded.
    pub(crate) fn seek_frame(&mut self, target: i64) -> Result<bool, FrameSeekError> {
        let mut reseeks = 0u32;

        loop {
            let delta = target - self.decode.frame_number;
            if delta < 0 || delta > self.options.forward_decode_threshold {
                self.coarse_seek(target)?;
            }

            if self.decode.frame_number != target {
                return self.decode_until(target);
            }

            if self.decode.pending {
                log::trace!("Frame {target} is already decoded and pending");
                return Ok(true);
            }

            // Either the frame at this position was never decoded, or it
            // was decoded and already fetched. One decode tells them apart.
            if !self.decode.decode_next()? {
                return Ok(false);
            }

            match self.decode.frame_number.cmp(&target) {
                Ordering::Equal => return Ok(true),
                Ordering::Greater => {
                    reseeks += 1;
                    if reseeks > self.options.max_reseek_attempts {
                        log::warn!("Giving up on frame {target} after {} re-seeks", reseeks - 1);
                        return Err(FrameSeekError::Seek {
                            target,
                            reason: format!("still past the target after {} re-seeks", reseeks - 1),
                        });
                    }
                    log::debug!(
                        "Overshot frame {target} (now at {}), seeking back",
                        self.decode.frame_number
                    );
                }
                Ordering::Less => {
                    return Err(FrameSeekError::Seek {
                        target,
                        reason: format!(
                            "decoder moved backwards to frame {}",
                            self.decode.frame_number
                        ),
                    });
                }
            }
        }
    }

    /// Seek to the keyframe at or before `target` and decode one picture.
    ///
    /// Returns the resulting decode position, or `None` when the backend
    /// refused the seek.
    pub(crate) fn seek_key_frame(&mut self, target: i64) -> Result<Option<i64>, FrameSeekError> {
        if let Err(error) = self.coarse_seek(target) {
            log::debug!("Keyframe seek refused: {error}");
            return Ok(None);
        }

        self.decode.decode_next()?;
        Ok(Some(self.decode.frame_number))
    }

    fn decode_until(&mut self, target: i64) -> Result<bool, FrameSeekError> {
        loop {
            let produced = self.decode.decode_next()?;
            if !produced || self.decode.frame_number >= target {
                return Ok(produced);
            }
        }
    }

    fn coarse_seek(&mut self, target: i64) -> Result<(), FrameSeekError> {
        let track_index = self.decode.track_index();
        log::debug!("Seeking track {track_index} to keyframe at or before frame {target}");

        self.decode
            .demuxer
            .seek_keyframe(track_index, target)
            .map_err(|error| FrameSeekError::Seek {
                target,
                reason: error.to_string(),
            })?;
        self.decode.reset_after_seek();
        Ok(())
    }
}
