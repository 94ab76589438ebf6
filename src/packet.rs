//! Packet cursor over the bound video track.
//!
//! [`PacketCursor`] owns the packet currently being decoded and the number of
//! its bytes the decoder has not consumed yet. Advancing drops the current
//! packet and pulls packets from the [`Demuxer`] until one belongs to the
//! selected track.

use crate::backend::{Demuxer, Packet};

/// The current packet and its undecoded remainder.
#[derive(Debug)]
pub(crate) struct PacketCursor {
    track_index: usize,
    packet: Option<Packet>,
    bytes_remaining: usize,
}

impl PacketCursor {
    pub(crate) const fn new(track_index: usize) -> Self {
        Self {
            track_index,
            packet: None,
            bytes_remaining: 0,
        }
    }

    pub(crate) const fn track_index(&self) -> usize {
        self.track_index
    }

    pub(crate) const fn bytes_remaining(&self) -> usize {
        self.bytes_remaining
    }

    pub(crate) const fn packet(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    /// The bytes not yet fed to the decoder. Empty when no packet is held.
    pub(crate) fn remaining(&self) -> &[u8] {
        match &self.packet {
            Some(packet) => {
                let start = packet.data.len().saturating_sub(self.bytes_remaining);
                packet.data.get(start..).unwrap_or_default()
            }
            None => &[],
        }
    }

    /// Mark `count` bytes as consumed. Never goes below zero.
    pub(crate) fn consume(&mut self, count: usize) {
        if count > self.bytes_remaining {
            log::trace!(
                "Decoder consumed {count} bytes with only {} remaining",
                self.bytes_remaining
            );
        }
        self.bytes_remaining = self.bytes_remaining.saturating_sub(count);
    }

    /// Drop whatever is left of the current packet.
    pub(crate) fn discard_remaining(&mut self) {
        self.bytes_remaining = 0;
    }

    /// Release the current packet.
    pub(crate) fn release(&mut self) {
        self.packet = None;
        self.bytes_remaining = 0;
    }

    /// Release the current packet and pull the next one of the bound track.
    ///
    /// Returns `false` on end-of-stream. Read errors also end the stream:
    /// the caller flushes the decoder either way.
    pub(crate) fn advance<D: Demuxer>(&mut self, demuxer: &mut D) -> bool {
        self.release();

        loop {
            match demuxer.read_packet() {
                Ok(Some(packet)) if packet.track_index == self.track_index => {
                    self.bytes_remaining = packet.size();
                    self.packet = Some(packet);
                    return true;
                }
                Ok(Some(packet)) => {
                    log::trace!("Skipping packet of track {}", packet.track_index);
                }
                Ok(None) => {
                    log::debug!("End of stream reached on track {}", self.track_index);
                    return false;
                }
                Err(error) => {
                    log::debug!("Packet read failed, treating as end of stream: {error}");
                    return false;
                }
            }
        }
    }
}
