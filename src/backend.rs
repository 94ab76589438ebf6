//! Decoding backend capability traits.
//!
//! The session never talks to a media library directly. Everything it needs
//! from one is expressed by the four traits in this module:
//!
//! - [`MediaBackend`] opens containers and builds decoders and converters.
//! - [`Demuxer`] describes tracks, yields [`Packet`]s and performs the coarse
//!   keyframe seek.
//! - [`PictureDecoder`] turns compressed bytes into a decoded picture held in
//!   a single caller-owned slot.
//! - [`PictureConverter`] writes a decoded picture into a packed 24-bit
//!   raster.
//!
//! [`FfmpegBackend`](crate::ffmpeg::FfmpegBackend) implements these on top of
//! FFmpeg; [`ScriptedBackend`](crate::scripted::ScriptedBackend) implements
//! them in memory for deterministic tests.

use std::path::Path;

use crate::{config::ChannelOrder, error::BackendError, metadata::FrameRate};

/// Classification of a track inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// A video elementary stream.
    Video,
    /// An audio elementary stream.
    Audio,
    /// A subtitle stream.
    Subtitle,
    /// Anything else (data, attachments, unknown).
    Other,
}

/// Introspection data for one track of an open container.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    /// Index of the track within the container.
    pub index: usize,
    /// What kind of stream the track carries.
    pub kind: MediaKind,
    /// Codec identity as reported by the container.
    pub codec_name: String,
    /// Picture width in pixels (`0` for non-video tracks).
    pub width: u32,
    /// Picture height in pixels (`0` for non-video tracks).
    pub height: u32,
    /// Native pixel format name, if known.
    pub pixel_format: Option<String>,
    /// Real base frame rate.
    pub frame_rate: FrameRate,
    /// Approximate number of frames, `0` when unknown.
    pub frame_count: u64,
}

/// A compressed data unit belonging to one track.
///
/// Timestamps are expressed in frame indices: a backend whose container uses
/// another timing base rescales them before handing packets out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    /// Index of the owning track.
    pub track_index: usize,
    /// Compressed payload.
    pub data: Vec<u8>,
    /// Decode timestamp.
    pub dts: Option<i64>,
    /// Presentation timestamp.
    pub pts: Option<i64>,
    /// Duration in frame units, `0` when unknown.
    pub duration: i64,
    /// Whether the packet starts a keyframe.
    pub is_keyframe: bool,
}

impl Packet {
    /// Total payload length in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Result of one call to [`PictureDecoder::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStatus {
    /// Bytes of the input the decoder consumed. Negative values signal a
    /// decode failure.
    pub consumed: isize,
    /// Whether the picture slot now holds a complete picture.
    pub picture_complete: bool,
}

/// Entry point of a decoding backend.
///
/// Resources handed out by a backend are released when dropped, so a
/// session that fails half-way through opening releases whatever it had
/// already acquired simply by returning.
pub trait MediaBackend {
    /// Container handle.
    type Demuxer: Demuxer;
    /// Codec handle.
    type Decoder: PictureDecoder;
    /// Conversion context from the decoder's native pixel format.
    type Converter: PictureConverter<Picture = <Self::Decoder as PictureDecoder>::Picture>;

    /// Open the container at `path` and read its stream information.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the container cannot be parsed.
    fn open_container(&mut self, path: &Path) -> Result<Self::Demuxer, BackendError>;

    /// Open a decoder for `track`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when no decoder exists or it fails to open.
    fn open_decoder(
        &mut self,
        demuxer: &Self::Demuxer,
        track: &TrackInfo,
    ) -> Result<Self::Decoder, BackendError>;

    /// Build a converter from the decoder's native pixel format to packed
    /// 24-bit color at the same dimensions.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the conversion is not supported.
    fn create_converter(
        &mut self,
        decoder: &Self::Decoder,
        track: &TrackInfo,
        order: ChannelOrder,
    ) -> Result<Self::Converter, BackendError>;
}

/// A demultiplexer over one open container.
pub trait Demuxer {
    /// Describe every track in the container, in container order.
    fn tracks(&self) -> Vec<TrackInfo>;

    /// Pull the next packet of any track. `Ok(None)` marks end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the container cannot be read.
    fn read_packet(&mut self) -> Result<Option<Packet>, BackendError>;

    /// Reposition on the nearest keyframe at or before `target_frame` of
    /// `track_index`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the container refuses the seek.
    fn seek_keyframe(&mut self, track_index: usize, target_frame: i64)
    -> Result<(), BackendError>;
}

/// A stateful video decoder.
///
/// Decoders may buffer internally: a call can consume bytes without
/// completing a picture, and a picture can complete from bytes fed by an
/// earlier call.
pub trait PictureDecoder {
    /// The decoded picture slot. One is allocated per session and reused.
    type Picture;

    /// Allocate the picture slot decode calls write into.
    fn allocate_picture(&self) -> Self::Picture;

    /// Name of the codec implementation, when it differs from the
    /// container's codec identity.
    fn codec_name(&self) -> Option<String> {
        None
    }

    /// Feed `input` to the decoder. An empty `input` asks the decoder to
    /// drain one buffered picture.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the decoder rejects the data.
    fn decode(
        &mut self,
        input: &[u8],
        picture: &mut Self::Picture,
    ) -> Result<DecodeStatus, BackendError>;

    /// Drop buffered state after the container was repositioned.
    fn reset(&mut self) {}
}

/// A pixel-format conversion context.
pub trait PictureConverter {
    /// The decoded picture type this converter reads.
    type Picture;

    /// Write `picture` into `output` as packed 24-bit pixels, `stride` bytes
    /// per row. Bytes past `width * 3` in each row are left untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the picture cannot be converted.
    fn convert(
        &mut self,
        picture: &Self::Picture,
        output: &mut [u8],
        stride: usize,
    ) -> Result<(), BackendError>;
}
