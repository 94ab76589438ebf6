//! Core [`StreamSession`] implementation.
//!
//! `StreamSession` is the main entry point of the crate. It binds the first
//! video track of a container, owns every backend resource needed to decode
//! it, and exposes sequential reads, frame-accurate seeks and keyframe
//! seeks on top of them.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use crate::{
    backend::{Demuxer, MediaBackend, MediaKind, PictureDecoder},
    config::SessionOptions,
    conversion::{PixelBuffer, PixelConverter},
    decode::FrameDecodeLoop,
    error::FrameSeekError,
    metadata::{FrameRate, StreamMetadata},
    seek::FrameSeeker,
};

/// Everything that only exists while a stream is open.
struct OpenStream<B: MediaBackend> {
    decode: FrameDecodeLoop<B::Demuxer, B::Decoder>,
    converter: PixelConverter<B::Converter>,
    metadata: StreamMetadata,
    path: PathBuf,
}

/// Frame-accurate reader over the first video track of a container.
///
/// A session is created closed, with [`new`](StreamSession::new), and bound
/// to a file with [`open`](StreamSession::open); or both at once with
/// [`open_with`](StreamSession::open_with). Every operation takes
/// `&mut self`, so a session is never used from two places at once.
///
/// The session keeps one decoded picture at a time. A picture produced by a
/// seek or a decode stays pending until it is fetched; the next decode call
/// overwrites it.
///
/// # Example
///
/// ```
/// use frameseek::{scripted::ScriptedBackend, StreamSession};
///
/// let backend = ScriptedBackend::new(10).with_keyframes([0, 5]);
/// let mut session = StreamSession::open_with(backend, "synthetic.mp4")?;
///
/// assert!(session.seek_frame(7)?);
/// let frame = session.read_next_frame()?.expect("frame 7");
/// assert_eq!(session.current_decode_timestamp(), Some(7));
/// assert_eq!(frame.width(), session.width().unwrap_or_default());
/// # Ok::<(), frameseek::FrameSeekError>(())
/// ```
pub struct StreamSession<B: MediaBackend> {
    backend: B,
    options: SessionOptions,
    stream: Option<OpenStream<B>>,
}

impl<B: MediaBackend> Debug for StreamSession<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut debug = f.debug_struct("StreamSession");
        debug.field("options", &self.options);
        match &self.stream {
            Some(stream) => debug
                .field("path", &stream.path)
                .field("metadata", &stream.metadata)
                .field("frame_number", &stream.decode.frame_number)
                .field("pending", &stream.decode.pending),
            None => debug.field("open", &false),
        };
        debug.finish_non_exhaustive()
    }
}

impl<B: MediaBackend> StreamSession<B> {
    /// Create a closed session with the default options.
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, SessionOptions::default())
    }

    /// Create a closed session with custom options.
    pub const fn with_options(backend: B, options: SessionOptions) -> Self {
        Self {
            backend,
            options,
            stream: None,
        }
    }

    /// Create a session and open `path` with it.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`open`](StreamSession::open).
    pub fn open_with<P: AsRef<Path>>(backend: B, path: P) -> Result<Self, FrameSeekError> {
        let mut session = Self::new(backend);
        session.open(path)?;
        Ok(session)
    }

    /// Open `path` and bind its first video track.
    ///
    /// A stream that is already open is closed first. On failure every
    /// resource acquired so far is released and the session stays closed.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::Open`] if the container cannot be parsed.
    /// - [`FrameSeekError::NoVideoTrack`] if no track is classified as video.
    /// - [`FrameSeekError::CodecUnavailable`] if no decoder can be opened.
    /// - [`FrameSeekError::ConversionInit`] if the pixel-format conversion
    ///   cannot be set up.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<(), FrameSeekError> {
        self.close();

        let path = path.as_ref();
        log::debug!("Opening video: {}", path.display());

        let demuxer =
            self.backend
                .open_container(path)
                .map_err(|error| FrameSeekError::Open {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                })?;

        let track = demuxer
            .tracks()
            .into_iter()
            .find(|track| track.kind == MediaKind::Video)
            .ok_or(FrameSeekError::NoVideoTrack)?;

        let decoder = self
            .backend
            .open_decoder(&demuxer, &track)
            .map_err(|error| FrameSeekError::CodecUnavailable {
                codec: track.codec_name.clone(),
                reason: error.to_string(),
            })?;

        let converter = self
            .backend
            .create_converter(&decoder, &track, self.options.channel_order)
            .map_err(|error| FrameSeekError::ConversionInit(error.to_string()))?;

        let metadata = StreamMetadata {
            width: track.width,
            height: track.height,
            frame_rate: track.frame_rate,
            codec_name: decoder
                .codec_name()
                .unwrap_or_else(|| track.codec_name.clone()),
            frame_count: track.frame_count,
            pixel_format: track.pixel_format.clone(),
            track_index: track.index,
        };

        log::info!(
            "Opened video: {} (track={}, {}x{}, {} fps, codec={}, ~{} frames)",
            path.display(),
            metadata.track_index,
            metadata.width,
            metadata.height,
            metadata.frame_rate,
            metadata.codec_name,
            metadata.frame_count,
        );

        self.stream = Some(OpenStream {
            decode: FrameDecodeLoop::new(demuxer, decoder, track.index),
            converter: PixelConverter::new(
                converter,
                track.width,
                track.height,
                self.options.channel_order,
            ),
            metadata,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Release every resource of the open stream.
    ///
    /// Safe to call on a session that was never opened, failed to open, or
    /// is already closed.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::debug!("Closing video: {}", stream.path.display());
        }
    }

    /// Returns `true` while a stream is bound.
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The options this session was created with.
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The backend driving this session.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Metadata of the bound track, `None` when closed.
    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.stream.as_ref().map(|stream| &stream.metadata)
    }

    /// Frame width in pixels.
    pub fn width(&self) -> Option<u32> {
        self.metadata().map(|metadata| metadata.width)
    }

    /// Frame height in pixels.
    pub fn height(&self) -> Option<u32> {
        self.metadata().map(|metadata| metadata.height)
    }

    /// Rational frame rate of the stream.
    pub fn frame_rate(&self) -> Option<FrameRate> {
        self.metadata().map(|metadata| metadata.frame_rate)
    }

    /// Frame rate as a float.
    pub fn frames_per_second(&self) -> Option<f64> {
        self.metadata().map(StreamMetadata::frames_per_second)
    }

    /// Name of the opened decoder.
    pub fn codec_name(&self) -> Option<&str> {
        self.metadata().map(|metadata| metadata.codec_name.as_str())
    }

    /// Total frame count as reported by the container. May be approximate.
    pub fn frame_count(&self) -> Option<u64> {
        self.metadata().map(|metadata| metadata.frame_count)
    }

    /// Decode timestamp of the most recently decoded picture.
    ///
    /// `Some(0)` right after opening.
    pub fn current_decode_timestamp(&self) -> Option<i64> {
        self.stream.as_ref().map(|stream| stream.decode.frame_number)
    }

    /// Presentation timestamp of the packet that completed the most recent
    /// picture, when the container provided one.
    pub fn presentation_timestamp(&self) -> Option<i64> {
        self.stream
            .as_ref()
            .and_then(|stream| stream.decode.presentation_timestamp)
    }

    /// Returns `true` when a decoded picture is waiting to be fetched.
    pub fn has_pending_frame(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| stream.decode.pending)
    }

    /// Convert the pending picture into `output`.
    ///
    /// Returns `Ok(false)` and leaves `output` untouched when nothing is
    /// pending.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::NotOpen`] if the session is closed.
    /// - [`FrameSeekError::BufferMismatch`] if `output` has other dimensions
    ///   than the video.
    /// - [`FrameSeekError::Conversion`] if the backend fails to convert.
    pub fn fetch_picture(&mut self, output: &mut PixelBuffer) -> Result<bool, FrameSeekError> {
        let stream = self.stream.as_mut().ok_or(FrameSeekError::NotOpen)?;
        if !stream.decode.pending {
            return Ok(false);
        }

        stream
            .converter
            .convert(&stream.decode.picture, output)?;
        stream.decode.pending = false;
        Ok(true)
    }

    /// Read the next frame into `output`.
    ///
    /// A picture left pending by a seek is returned without decoding.
    /// Returns `Ok(false)` at end-of-stream.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::NotOpen`] if the session is closed.
    /// - [`FrameSeekError::Decode`] if the decoder rejects the stream.
    /// - Any error from [`fetch_picture`](StreamSession::fetch_picture).
    pub fn read_next_frame_into(&mut self, output: &mut PixelBuffer) -> Result<bool, FrameSeekError> {
        let stream = self.stream.as_mut().ok_or(FrameSeekError::NotOpen)?;
        if !stream.decode.pending && !stream.decode.decode_next()? {
            return Ok(false);
        }
        self.fetch_picture(output)
    }

    /// Read the next frame into a newly allocated buffer.
    ///
    /// Returns `Ok(None)` at end-of-stream.
    ///
    /// # Errors
    ///
    /// Same as [`read_next_frame_into`](StreamSession::read_next_frame_into).
    pub fn read_next_frame(&mut self) -> Result<Option<PixelBuffer>, FrameSeekError> {
        let (width, height) = self.dimensions()?;
        let mut output = PixelBuffer::new(width, height);
        if self.read_next_frame_into(&mut output)? {
            Ok(Some(output))
        } else {
            Ok(None)
        }
    }

    /// Seek to frame `index` and read it.
    ///
    /// Returns `Ok(None)` when the seek cannot reach the frame, including
    /// when the backend refuses the seek.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::NotOpen`] if the session is closed.
    /// - [`FrameSeekError::Decode`] if the decoder rejects the stream.
    pub fn read_frame(&mut self, index: i64) -> Result<Option<PixelBuffer>, FrameSeekError> {
        match self.seek_frame(index) {
            Ok(true) => self.read_next_frame(),
            Ok(false) => Ok(None),
            Err(FrameSeekError::Seek { target, reason }) => {
                log::warn!("Cannot read frame {target}: {reason}");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Decode up to frame `index` so that the next read returns it.
    ///
    /// Short forward hops are decoded sequentially; anything else seeks to
    /// the nearest keyframe at or before `index` first. Returns `Ok(false)`
    /// when the stream ends before the frame is reached.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::NotOpen`] if the session is closed.
    /// - [`FrameSeekError::Seek`] if the backend refuses the seek or the
    ///   decode position cannot be reconciled with `index`.
    /// - [`FrameSeekError::Decode`] if the decoder rejects the stream.
    pub fn seek_frame(&mut self, index: i64) -> Result<bool, FrameSeekError> {
        let stream = self.stream.as_mut().ok_or(FrameSeekError::NotOpen)?;
        FrameSeeker::new(&mut stream.decode, &self.options).seek_frame(index)
    }

    /// Seek to the keyframe at or before `index` and decode it.
    ///
    /// Returns the resulting decode timestamp, or `None` when the backend
    /// refused the seek. Does not try to reach `index` exactly.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::NotOpen`] if the session is closed.
    /// - [`FrameSeekError::Decode`] if the decoder rejects the stream.
    pub fn seek_key_frame(&mut self, index: i64) -> Result<Option<i64>, FrameSeekError> {
        let stream = self.stream.as_mut().ok_or(FrameSeekError::NotOpen)?;
        FrameSeeker::new(&mut stream.decode, &self.options).seek_key_frame(index)
    }

    fn dimensions(&self) -> Result<(u32, u32), FrameSeekError> {
        self.metadata()
            .map(|metadata| (metadata.width, metadata.height))
            .ok_or(FrameSeekError::NotOpen)
    }
}
