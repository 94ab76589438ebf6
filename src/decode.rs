//! One-picture-per-call decode loop.
//!
//! [`FrameDecodeLoop`] owns the demuxer, the decoder, the packet cursor and
//! the single decoded-picture slot of a session, together with the position
//! state derived from them. Each call to
//! [`decode_next`](FrameDecodeLoop::decode_next) feeds packets to the
//! decoder until exactly one picture completes or the stream runs dry.

use crate::{
    backend::{Demuxer, PictureDecoder},
    error::FrameSeekError,
    packet::PacketCursor,
};

pub(crate) struct FrameDecodeLoop<D: Demuxer, P: PictureDecoder> {
    pub(crate) demuxer: D,
    pub(crate) decoder: P,
    pub(crate) cursor: PacketCursor,
    /// Valid until the next decode call.
    pub(crate) picture: P::Picture,
    /// Decode timestamp of the packet that completed the last picture.
    pub(crate) frame_number: i64,
    /// A picture has completed and has not been fetched yet.
    pub(crate) pending: bool,
    pub(crate) presentation_timestamp: Option<i64>,
}

impl<D: Demuxer, P: PictureDecoder> FrameDecodeLoop<D, P> {
    pub(crate) fn new(demuxer: D, decoder: P, track_index: usize) -> Self {
        let picture = decoder.allocate_picture();
        Self {
            demuxer,
            decoder,
            cursor: PacketCursor::new(track_index),
            picture,
            frame_number: 0,
            pending: false,
            presentation_timestamp: None,
        }
    }

    pub(crate) const fn track_index(&self) -> usize {
        self.cursor.track_index()
    }

    /// Produce one decoded picture.
    ///
    /// Returns `Ok(false)` once the stream is exhausted and the decoder has
    /// nothing left to drain.
    pub(crate) fn decode_next(&mut self) -> Result<bool, FrameSeekError> {
        loop {
            while self.cursor.bytes_remaining() > 0 {
                let status = self
                    .decoder
                    .decode(self.cursor.remaining(), &mut self.picture)
                    .map_err(|error| FrameSeekError::Decode(error.to_string()))?;

                if status.consumed < 0 {
                    return Err(FrameSeekError::Decode(format!(
                        "decoder reported {} bytes consumed",
                        status.consumed
                    )));
                }
                self.cursor.consume(status.consumed.unsigned_abs());

                if status.picture_complete {
                    self.complete_picture();
                    return Ok(true);
                }

                if status.consumed == 0 {
                    log::warn!(
                        "Decoder made no progress on {} bytes, dropping the rest of the packet",
                        self.cursor.bytes_remaining()
                    );
                    self.cursor.discard_remaining();
                }
            }

            // Buffering decoders can swallow whole packets without output,
            // mostly near the start of a stream.
            if !self.cursor.advance(&mut self.demuxer) {
                break;
            }
        }

        self.flush()
    }

    /// Drain a picture buffered inside the decoder after input ran out.
    fn flush(&mut self) -> Result<bool, FrameSeekError> {
        let status = self
            .decoder
            .decode(self.cursor.remaining(), &mut self.picture)
            .map_err(|error| FrameSeekError::Decode(error.to_string()))?;
        self.cursor.release();

        self.pending = status.picture_complete;
        log::trace!("Flush call completed a picture: {}", status.picture_complete);
        Ok(self.pending)
    }

    fn complete_picture(&mut self) {
        let (dts, pts) = self
            .cursor
            .packet()
            .map_or((None, None), |packet| (packet.dts, packet.pts));

        self.frame_number = dts.or(pts).unwrap_or(self.frame_number + 1);
        self.presentation_timestamp = pts;
        self.pending = true;
    }

    /// Forget buffered input and any pending picture after a seek.
    pub(crate) fn reset_after_seek(&mut self) {
        self.cursor.release();
        self.decoder.reset();
        self.pending = false;
    }
}
