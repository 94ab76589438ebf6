//! FFmpeg decoding backend.
//!
//! [`FfmpegBackend`] implements the capability traits of
//! [`crate::backend`] with [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next).
//! Packet timestamps are rescaled from each stream's time base into frame
//! indices, so decode timestamps reported by a session are frame numbers.
//!
//! # Example
//!
//! ```no_run
//! use frameseek::ffmpeg::FfmpegSession;
//!
//! let mut session = FfmpegSession::open_file("input.mp4")?;
//! if let Some(frame) = session.read_frame(120)? {
//!     frame.to_rgb_image().save("frame_120.png")?;
//! }
//! # Ok::<(), frameseek::FrameSeekError>(())
//! ```
//!
//! FFmpeg has its own logging, separate from the `log` facade used by this
//! crate. Use [`FfmpegBackend::with_log_level`] to tune it; a `log`
//! subscriber such as `env_logger` controls the rest.

use std::{os::raw::c_int, path::Path};

use ffmpeg_next::{
    Error as FfmpegError, Packet as FfmpegPacket, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input, stream::Stream},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};
use ffmpeg_sys_next::{AVSEEK_FLAG_BACKWARD, av_seek_frame};

use crate::{
    backend::{
        DecodeStatus, Demuxer, MediaBackend, MediaKind, Packet, PictureConverter, PictureDecoder,
        TrackInfo,
    },
    config::ChannelOrder,
    conversion::BYTES_PER_PIXEL,
    error::{BackendError, FrameSeekError},
    metadata::FrameRate,
    session::StreamSession,
};

/// A [`StreamSession`] reading through FFmpeg.
pub type FfmpegSession = StreamSession<FfmpegBackend>;

impl StreamSession<FfmpegBackend> {
    /// Open `path` with a default [`FfmpegBackend`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`StreamSession::open`].
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, FrameSeekError> {
        Self::open_with(FfmpegBackend::default(), path)
    }
}

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. Setting a level causes
/// FFmpeg to suppress all messages below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log conditions the process aborts on.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors.
    Error,
    /// Log warnings (default FFmpeg level).
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> ffmpeg_next::util::log::Level {
        use ffmpeg_next::util::log::Level;

        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

/// Backend built on the FFmpeg libraries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    log_level: Option<FfmpegLogLevel>,
}

impl FfmpegBackend {
    /// A backend that leaves FFmpeg's log level alone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set FFmpeg's own log level when the next container is opened.
    #[must_use]
    pub const fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }
}

fn to_frame_rate(rational: Rational) -> FrameRate {
    FrameRate::new(rational.numerator(), rational.denominator())
}

/// The stream's real base frame rate, falling back to the average rate.
fn real_frame_rate(stream: &Stream<'_>) -> FrameRate {
    let rate = to_frame_rate(stream.rate());
    if rate.is_known() {
        rate
    } else {
        to_frame_rate(stream.avg_frame_rate())
    }
}

fn estimate_frame_count(stream: &Stream<'_>, container_duration: i64, frame_rate: FrameRate) -> u64 {
    if stream.frames() > 0 {
        return stream.frames() as u64;
    }

    let frames_per_second = frame_rate.as_f64();
    let seconds = if stream.duration() > 0 {
        let time_base = stream.time_base();
        stream.duration() as f64 * time_base.numerator() as f64
            / time_base.denominator().max(1) as f64
    } else if container_duration > 0 {
        container_duration as f64 / 1_000_000.0
    } else {
        0.0
    };
    (seconds * frames_per_second).round() as u64
}

fn describe_track(stream: &Stream<'_>, container_duration: i64) -> TrackInfo {
    let parameters = stream.parameters();
    let kind = match parameters.medium() {
        Type::Video => MediaKind::Video,
        Type::Audio => MediaKind::Audio,
        Type::Subtitle => MediaKind::Subtitle,
        _ => MediaKind::Other,
    };
    let frame_rate = real_frame_rate(stream);

    let mut track = TrackInfo {
        index: stream.index(),
        kind,
        codec_name: parameters.id().name().to_string(),
        width: 0,
        height: 0,
        pixel_format: None,
        frame_rate,
        frame_count: estimate_frame_count(stream, container_duration, frame_rate),
    };

    if kind == MediaKind::Video {
        if let Ok(context) = CodecContext::from_parameters(parameters) {
            // SAFETY: `context` owns a valid AVCodecContext for this scope.
            let raw = unsafe { &*context.as_ptr() };
            track.width = raw.width.max(0) as u32;
            track.height = raw.height.max(0) as u32;
            let pixel = Pixel::from(raw.pix_fmt);
            if pixel != Pixel::None {
                track.pixel_format = Some(format!("{pixel:?}"));
            }
        }
    }

    track
}

impl MediaBackend for FfmpegBackend {
    type Demuxer = FfmpegDemuxer;
    type Decoder = FfmpegDecoder;
    type Converter = FfmpegConverter;

    fn open_container(&mut self, path: &Path) -> Result<FfmpegDemuxer, BackendError> {
        // Safe to call repeatedly.
        ffmpeg_next::init()?;
        if let Some(level) = self.log_level {
            ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
        }

        let input = ffmpeg_next::format::input(&path)?;
        let container_duration = input.duration();
        let tracks: Vec<TrackInfo> = input
            .streams()
            .map(|stream| describe_track(&stream, container_duration))
            .collect();
        let time_bases = input
            .streams()
            .map(|stream| to_frame_rate(stream.time_base()))
            .collect();

        log::debug!(
            "FFmpeg opened {} ({} streams, format={})",
            path.display(),
            tracks.len(),
            input.format().name(),
        );

        Ok(FfmpegDemuxer {
            input,
            tracks,
            time_bases,
        })
    }

    fn open_decoder(
        &mut self,
        demuxer: &FfmpegDemuxer,
        track: &TrackInfo,
    ) -> Result<FfmpegDecoder, BackendError> {
        let stream = demuxer
            .input
            .stream(track.index)
            .ok_or_else(|| BackendError::new(format!("stream {} not found", track.index)))?;
        let context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        Ok(FfmpegDecoder {
            decoder,
            draining: false,
        })
    }

    fn create_converter(
        &mut self,
        decoder: &FfmpegDecoder,
        _track: &TrackInfo,
        order: ChannelOrder,
    ) -> Result<FfmpegConverter, BackendError> {
        let target = match order {
            ChannelOrder::Rgb => Pixel::RGB24,
            ChannelOrder::Bgr => Pixel::BGR24,
        };
        let width = decoder.decoder.width();
        let height = decoder.decoder.height();

        // Same dimensions on both sides: only the pixel layout changes.
        let scaler = ScalingContext::get(
            decoder.decoder.format(),
            width,
            height,
            target,
            width,
            height,
            ScalingFlags::BICUBIC,
        )?;

        Ok(FfmpegConverter {
            scaler,
            converted: VideoFrame::empty(),
            width,
            height,
        })
    }
}

/// Container handle backed by an FFmpeg input context.
pub struct FfmpegDemuxer {
    input: Input,
    tracks: Vec<TrackInfo>,
    /// Per-stream time bases, indexed by stream index.
    time_bases: Vec<FrameRate>,
}

impl FfmpegDemuxer {
    fn timing(&self, track_index: usize) -> (FrameRate, FrameRate) {
        let time_base = self
            .time_bases
            .get(track_index)
            .copied()
            .unwrap_or(FrameRate::new(1, 90_000));
        let frame_rate = self
            .tracks
            .get(track_index)
            .map(|track| track.frame_rate)
            .unwrap_or_default();
        (time_base, frame_rate)
    }
}

impl Demuxer for FfmpegDemuxer {
    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks.clone()
    }

    fn read_packet(&mut self) -> Result<Option<Packet>, BackendError> {
        let mut packet = FfmpegPacket::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {}
            Err(FfmpegError::Eof) => return Ok(None),
            Err(error) => return Err(error.into()),
        }

        let track_index = packet.stream();
        let (time_base, frame_rate) = self.timing(track_index);
        let to_frame = |timestamp: i64| {
            crate::utilities::stream_timestamp_to_frame_number(timestamp, time_base, frame_rate)
        };

        Ok(Some(Packet {
            track_index,
            data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
            dts: packet.dts().map(to_frame),
            pts: packet.pts().map(to_frame),
            duration: to_frame(packet.duration()),
            is_keyframe: packet.is_key(),
        }))
    }

    fn seek_keyframe(
        &mut self,
        track_index: usize,
        target_frame: i64,
    ) -> Result<(), BackendError> {
        let (time_base, frame_rate) = self.timing(track_index);
        let timestamp =
            crate::utilities::frame_number_to_stream_timestamp(target_frame, time_base, frame_rate);
        let stream_index = c_int::try_from(track_index)
            .map_err(|_| BackendError::new(format!("stream index {track_index} out of range")))?;

        // SAFETY: the format context is owned by `self.input` and outlives
        // the call.
        let result = unsafe {
            av_seek_frame(
                self.input.as_mut_ptr(),
                stream_index,
                timestamp,
                AVSEEK_FLAG_BACKWARD as c_int,
            )
        };

        if result < 0 {
            Err(FfmpegError::from(result).into())
        } else {
            Ok(())
        }
    }
}

/// Codec handle backed by an FFmpeg video decoder.
///
/// FFmpeg's send/receive API is mapped onto (bytes consumed, picture
/// complete): a packet is consumed whole unless the decoder is full, and
/// empty input switches the decoder into draining mode.
pub struct FfmpegDecoder {
    decoder: VideoDecoder,
    draining: bool,
}

impl PictureDecoder for FfmpegDecoder {
    type Picture = VideoFrame;

    fn allocate_picture(&self) -> VideoFrame {
        VideoFrame::empty()
    }

    fn codec_name(&self) -> Option<String> {
        self.decoder.codec().map(|codec| codec.name().to_string())
    }

    fn decode(
        &mut self,
        input: &[u8],
        picture: &mut VideoFrame,
    ) -> Result<DecodeStatus, BackendError> {
        let consumed = if input.is_empty() {
            if !self.draining {
                match self.decoder.send_eof() {
                    Ok(()) | Err(FfmpegError::Eof) => {}
                    Err(error) => return Err(error.into()),
                }
                self.draining = true;
            }
            0
        } else {
            match self.decoder.send_packet(&FfmpegPacket::copy(input)) {
                Ok(()) => input.len(),
                // Output must be received before more input is accepted.
                Err(FfmpegError::Other { errno }) if errno == EAGAIN => 0,
                Err(error) => return Err(error.into()),
            }
        };

        let picture_complete = match self.decoder.receive_frame(picture) {
            Ok(()) => true,
            Err(FfmpegError::Eof) => false,
            Err(FfmpegError::Other { errno }) if errno == EAGAIN => false,
            Err(error) => return Err(error.into()),
        };

        Ok(DecodeStatus {
            consumed: consumed as isize,
            picture_complete,
        })
    }

    fn reset(&mut self) {
        self.decoder.flush();
        self.draining = false;
    }
}

/// Conversion context backed by an FFmpeg software scaler.
pub struct FfmpegConverter {
    scaler: ScalingContext,
    converted: VideoFrame,
    width: u32,
    height: u32,
}

impl PictureConverter for FfmpegConverter {
    type Picture = VideoFrame;

    fn convert(
        &mut self,
        picture: &VideoFrame,
        output: &mut [u8],
        stride: usize,
    ) -> Result<(), BackendError> {
        self.scaler.run(picture, &mut self.converted)?;

        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let rows = self.height as usize;
        if rows > 0 && output.len() < (rows - 1) * stride + row_bytes {
            return Err(BackendError::new("output buffer is too small"));
        }

        crate::utilities::copy_rows(
            self.converted.data(0),
            self.converted.stride(0),
            output,
            stride,
            row_bytes,
            rows,
        );
        Ok(())
    }
}
