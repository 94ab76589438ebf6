//! Deterministic in-memory backend.
//!
//! [`ScriptedBackend`] synthesizes a container with one video track (and
//! optionally an audio track interleaved before it) whose packets, keyframes,
//! decode timestamps and decoder behaviour are all scripted up front. It
//! records every backend call in [`ScriptedStats`] so tests can check not
//! only what a session returned but how much work it asked the backend for.
//!
//! Each video packet carries its frame index in its first eight bytes. The
//! scripted decoder reassembles packets from however many bytes it is fed
//! per call, and the scripted converter paints every pixel of frame `f` at
//! `(x, y)` as `[f, x, y]` (truncated to bytes), see
//! [`ScriptedBackend::expected_pixel`].
//!
//! # Example
//!
//! ```
//! use frameseek::{scripted::ScriptedBackend, StreamSession};
//!
//! let backend = ScriptedBackend::new(3).with_chunk_size(5).with_decoder_delay(1);
//! let mut session = StreamSession::open_with(backend, "clip.mkv")?;
//!
//! let mut frames = 0;
//! while session.read_next_frame()?.is_some() {
//!     frames += 1;
//! }
//! assert_eq!(frames, 3);
//! assert!(session.backend().stats().flush_calls > 0);
//! # Ok::<(), frameseek::FrameSeekError>(())
//! ```

use std::{
    cell::RefCell,
    collections::{BTreeSet, VecDeque},
    path::Path,
    rc::Rc,
};

use crate::{
    backend::{
        DecodeStatus, Demuxer, MediaBackend, MediaKind, Packet, PictureConverter, PictureDecoder,
        TrackInfo,
    },
    config::ChannelOrder,
    error::BackendError,
    metadata::FrameRate,
};

const FRAME_ID_BYTES: usize = 8;
const FILLER_BYTE: u8 = 0xAB;

/// Counters of every call a [`ScriptedBackend`] received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedStats {
    /// Calls to `open_container`, successful or not.
    pub containers_opened: u32,
    /// Containers currently alive.
    pub live_containers: u32,
    /// Decoders currently alive.
    pub live_decoders: u32,
    /// Converters currently alive.
    pub live_converters: u32,
    /// Packets handed out, of any track.
    pub packets_read: u64,
    /// Calls to `decode`, flushes included.
    pub decode_calls: u64,
    /// Calls to `decode` with empty input.
    pub flush_calls: u64,
    /// Calls to `seek_keyframe`, refused ones included.
    pub seek_calls: u64,
    /// Decode timestamp of the keyframe each accepted seek landed on.
    pub seek_landings: Vec<i64>,
    /// Calls to the decoder's `reset`.
    pub decoder_resets: u64,
    /// Successful conversions.
    pub conversions: u64,
    /// Frame indices in the order the decoder completed them.
    pub decoded_frames: Vec<i64>,
}

#[derive(Debug, Clone)]
struct Script {
    frame_count: usize,
    keyframes: BTreeSet<usize>,
    decode_timestamps: Vec<i64>,
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    codec_name: String,
    packet_size: usize,
    chunk_size: usize,
    decoder_delay: usize,
    audio_track: bool,
    video_track: bool,
    fail_open: bool,
    fail_decoder: bool,
    fail_converter: bool,
    fail_seeks: bool,
    fail_decode_at: Option<u64>,
    fail_read_at: Option<usize>,
}

impl Script {
    const fn video_track_index(&self) -> usize {
        if self.audio_track { 1 } else { 0 }
    }

    fn decode_timestamp(&self, frame: usize) -> i64 {
        self.decode_timestamps
            .get(frame)
            .copied()
            .unwrap_or(frame as i64)
    }
}

type SharedStats = Rc<RefCell<ScriptedStats>>;

/// An in-memory backend with scripted behaviour.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Script,
    stats: SharedStats,
}

impl ScriptedBackend {
    /// A stream of `frame_count` frames with a single keyframe at frame 0,
    /// 8x4 pixels at 25 fps, one packet per frame, decoded without delay.
    pub fn new(frame_count: usize) -> Self {
        Self {
            script: Script {
                frame_count,
                keyframes: BTreeSet::from([0]),
                decode_timestamps: Vec::new(),
                width: 8,
                height: 4,
                frame_rate: FrameRate::new(25, 1),
                codec_name: "scripted".to_string(),
                packet_size: 16,
                chunk_size: usize::MAX,
                decoder_delay: 0,
                audio_track: false,
                video_track: true,
                fail_open: false,
                fail_decoder: false,
                fail_converter: false,
                fail_seeks: false,
                fail_decode_at: None,
                fail_read_at: None,
            },
            stats: SharedStats::default(),
        }
    }

    /// Replace the keyframe set. Frame 0 is always added.
    #[must_use]
    pub fn with_keyframes(mut self, keyframes: impl IntoIterator<Item = usize>) -> Self {
        self.script.keyframes = keyframes.into_iter().collect();
        self.script.keyframes.insert(0);
        self
    }

    /// Place a keyframe every `interval` frames.
    #[must_use]
    pub fn with_keyframe_interval(self, interval: usize) -> Self {
        let frame_count = self.script.frame_count;
        self.with_keyframes((0..frame_count).step_by(interval.max(1)))
    }

    /// Set the picture dimensions.
    #[must_use]
    pub const fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.script.width = width;
        self.script.height = height;
        self
    }

    /// Set the reported frame rate.
    #[must_use]
    pub const fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.script.frame_rate = frame_rate;
        self
    }

    /// Override the decode timestamp of each frame, in packet order. Frames
    /// past the end of `timestamps` keep their index.
    #[must_use]
    pub fn with_decode_timestamps(mut self, timestamps: impl IntoIterator<Item = i64>) -> Self {
        self.script.decode_timestamps = timestamps.into_iter().collect();
        self
    }

    /// Set the size of each video packet (at least eight bytes).
    #[must_use]
    pub fn with_packet_size(mut self, bytes: usize) -> Self {
        self.script.packet_size = bytes.max(FRAME_ID_BYTES);
        self
    }

    /// Make the decoder consume at most `bytes` per call.
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.script.chunk_size = bytes.max(1);
        self
    }

    /// Make the decoder hold `pictures` completed pictures back until more
    /// input arrives or it is drained.
    #[must_use]
    pub const fn with_decoder_delay(mut self, pictures: usize) -> Self {
        self.script.decoder_delay = pictures;
        self
    }

    /// Add an audio track at index 0, interleaved before every video packet.
    #[must_use]
    pub const fn with_audio_track(mut self) -> Self {
        self.script.audio_track = true;
        self
    }

    /// Leave the video track out of the container.
    #[must_use]
    pub const fn without_video_track(mut self) -> Self {
        self.script.video_track = false;
        self
    }

    /// Refuse to open the container.
    #[must_use]
    pub const fn failing_open(mut self) -> Self {
        self.script.fail_open = true;
        self
    }

    /// Refuse to open a decoder.
    #[must_use]
    pub const fn failing_decoder(mut self) -> Self {
        self.script.fail_decoder = true;
        self
    }

    /// Refuse to build a converter.
    #[must_use]
    pub const fn failing_converter(mut self) -> Self {
        self.script.fail_converter = true;
        self
    }

    /// Refuse every keyframe seek.
    #[must_use]
    pub const fn failing_seeks(mut self) -> Self {
        self.script.fail_seeks = true;
        self
    }

    /// Report negative bytes consumed on the `call`-th decode call
    /// (1-based, counted per decoder).
    #[must_use]
    pub const fn failing_decode_at(mut self, call: u64) -> Self {
        self.script.fail_decode_at = Some(call);
        self
    }

    /// Fail every read at container position `position` (0-based, counting
    /// packets of all tracks).
    #[must_use]
    pub const fn failing_read_at(mut self, position: usize) -> Self {
        self.script.fail_read_at = Some(position);
        self
    }

    /// A snapshot of the call counters.
    pub fn stats(&self) -> ScriptedStats {
        self.stats.borrow().clone()
    }

    /// The pixel the scripted converter paints at `(x, y)` of `frame`, as
    /// `[red, green, blue]`.
    pub const fn expected_pixel(frame: i64, x: u32, y: u32) -> [u8; 3] {
        [frame as u8, x as u8, y as u8]
    }
}

impl MediaBackend for ScriptedBackend {
    type Demuxer = ScriptedDemuxer;
    type Decoder = ScriptedDecoder;
    type Converter = ScriptedConverter;

    fn open_container(&mut self, path: &Path) -> Result<ScriptedDemuxer, BackendError> {
        self.stats.borrow_mut().containers_opened += 1;
        if self.script.fail_open {
            return Err(BackendError::new(format!(
                "cannot parse {}",
                path.display()
            )));
        }

        let script = Rc::new(self.script.clone());
        let mut layout = Vec::new();
        for frame in 0..script.frame_count {
            if script.audio_track {
                layout.push((MediaKind::Audio, frame));
            }
            if script.video_track {
                layout.push((MediaKind::Video, frame));
            }
        }

        self.stats.borrow_mut().live_containers += 1;
        Ok(ScriptedDemuxer {
            script,
            stats: Rc::clone(&self.stats),
            layout,
            position: 0,
        })
    }

    fn open_decoder(
        &mut self,
        _demuxer: &ScriptedDemuxer,
        track: &TrackInfo,
    ) -> Result<ScriptedDecoder, BackendError> {
        if self.script.fail_decoder {
            return Err(BackendError::new(format!(
                "no decoder for {}",
                track.codec_name
            )));
        }

        self.stats.borrow_mut().live_decoders += 1;
        Ok(ScriptedDecoder {
            script: Rc::new(self.script.clone()),
            stats: Rc::clone(&self.stats),
            partial: Vec::new(),
            completed: VecDeque::new(),
            calls: 0,
        })
    }

    fn create_converter(
        &mut self,
        _decoder: &ScriptedDecoder,
        track: &TrackInfo,
        order: ChannelOrder,
    ) -> Result<ScriptedConverter, BackendError> {
        if self.script.fail_converter {
            return Err(BackendError::new(format!(
                "unsupported pixel format {:?}",
                track.pixel_format
            )));
        }

        self.stats.borrow_mut().live_converters += 1;
        Ok(ScriptedConverter {
            stats: Rc::clone(&self.stats),
            width: track.width,
            height: track.height,
            order,
        })
    }
}

/// Container handle of a [`ScriptedBackend`].
#[derive(Debug)]
pub struct ScriptedDemuxer {
    script: Rc<Script>,
    stats: SharedStats,
    layout: Vec<(MediaKind, usize)>,
    position: usize,
}

impl ScriptedDemuxer {
    fn video_packet(&self, frame: usize) -> Packet {
        let mut data = vec![FILLER_BYTE; self.script.packet_size];
        data[..FRAME_ID_BYTES].copy_from_slice(&(frame as u64).to_le_bytes());
        let timestamp = self.script.decode_timestamp(frame);

        Packet {
            track_index: self.script.video_track_index(),
            data,
            dts: Some(timestamp),
            pts: Some(timestamp),
            duration: 1,
            is_keyframe: self.script.keyframes.contains(&frame),
        }
    }

    fn audio_packet(frame: usize) -> Packet {
        Packet {
            track_index: 0,
            data: vec![0; 4],
            dts: Some(frame as i64),
            pts: Some(frame as i64),
            duration: 1,
            is_keyframe: true,
        }
    }
}

impl Demuxer for ScriptedDemuxer {
    fn tracks(&self) -> Vec<TrackInfo> {
        let mut tracks = Vec::new();
        if self.script.audio_track {
            tracks.push(TrackInfo {
                index: 0,
                kind: MediaKind::Audio,
                codec_name: "pcm".to_string(),
                width: 0,
                height: 0,
                pixel_format: None,
                frame_rate: FrameRate::default(),
                frame_count: 0,
            });
        }
        if self.script.video_track {
            tracks.push(TrackInfo {
                index: self.script.video_track_index(),
                kind: MediaKind::Video,
                codec_name: self.script.codec_name.clone(),
                width: self.script.width,
                height: self.script.height,
                pixel_format: Some("yuv420p".to_string()),
                frame_rate: self.script.frame_rate,
                frame_count: self.script.frame_count as u64,
            });
        }
        tracks
    }

    fn read_packet(&mut self) -> Result<Option<Packet>, BackendError> {
        if self.script.fail_read_at == Some(self.position) {
            return Err(BackendError::new(format!(
                "read error at position {}",
                self.position
            )));
        }

        let Some(&(kind, frame)) = self.layout.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        self.stats.borrow_mut().packets_read += 1;

        Ok(Some(match kind {
            MediaKind::Video => self.video_packet(frame),
            _ => Self::audio_packet(frame),
        }))
    }

    fn seek_keyframe(
        &mut self,
        track_index: usize,
        target_frame: i64,
    ) -> Result<(), BackendError> {
        self.stats.borrow_mut().seek_calls += 1;
        if self.script.fail_seeks {
            return Err(BackendError::new("seeking is not supported"));
        }
        if !self.script.video_track || track_index != self.script.video_track_index() {
            return Err(BackendError::new(format!("cannot seek track {track_index}")));
        }

        let keyframe = self
            .script
            .keyframes
            .iter()
            .rev()
            .copied()
            .find(|&frame| self.script.decode_timestamp(frame) <= target_frame)
            .or_else(|| self.script.keyframes.first().copied())
            .unwrap_or(0);

        self.position = self
            .layout
            .iter()
            .position(|&(_, frame)| frame == keyframe)
            .unwrap_or(self.layout.len());
        self.stats
            .borrow_mut()
            .seek_landings
            .push(self.script.decode_timestamp(keyframe));
        Ok(())
    }
}

impl Drop for ScriptedDemuxer {
    fn drop(&mut self) {
        self.stats.borrow_mut().live_containers -= 1;
    }
}

/// The decoded picture slot of a [`ScriptedBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedPicture {
    frame: Option<i64>,
}

impl ScriptedPicture {
    /// Index of the frame last decoded into this slot.
    pub const fn frame(&self) -> Option<i64> {
        self.frame
    }
}

/// Codec handle of a [`ScriptedBackend`].
#[derive(Debug)]
pub struct ScriptedDecoder {
    script: Rc<Script>,
    stats: SharedStats,
    /// Bytes of a packet that has not been fully fed yet.
    partial: Vec<u8>,
    /// Completed pictures held back by the decoder delay.
    completed: VecDeque<i64>,
    calls: u64,
}

impl ScriptedDecoder {
    fn emit(&mut self, picture: &mut ScriptedPicture, draining: bool) -> bool {
        if !draining && self.completed.len() <= self.script.decoder_delay {
            return false;
        }
        let Some(frame) = self.completed.pop_front() else {
            return false;
        };

        picture.frame = Some(frame);
        self.stats.borrow_mut().decoded_frames.push(frame);
        true
    }
}

impl PictureDecoder for ScriptedDecoder {
    type Picture = ScriptedPicture;

    fn allocate_picture(&self) -> ScriptedPicture {
        ScriptedPicture::default()
    }

    fn decode(
        &mut self,
        input: &[u8],
        picture: &mut ScriptedPicture,
    ) -> Result<DecodeStatus, BackendError> {
        self.calls += 1;
        self.stats.borrow_mut().decode_calls += 1;

        if self.script.fail_decode_at == Some(self.calls) {
            return Ok(DecodeStatus {
                consumed: -1,
                picture_complete: false,
            });
        }

        if input.is_empty() {
            self.stats.borrow_mut().flush_calls += 1;
            return Ok(DecodeStatus {
                consumed: 0,
                picture_complete: self.emit(picture, true),
            });
        }

        let take = input.len().min(self.script.chunk_size);
        self.partial.extend_from_slice(&input[..take]);
        if self.partial.len() >= self.script.packet_size {
            let mut id = [0; FRAME_ID_BYTES];
            id.copy_from_slice(&self.partial[..FRAME_ID_BYTES]);
            self.completed.push_back(u64::from_le_bytes(id) as i64);
            self.partial.clear();
        }

        Ok(DecodeStatus {
            consumed: take as isize,
            picture_complete: self.emit(picture, false),
        })
    }

    fn reset(&mut self) {
        self.partial.clear();
        self.completed.clear();
        self.stats.borrow_mut().decoder_resets += 1;
    }
}

impl Drop for ScriptedDecoder {
    fn drop(&mut self) {
        self.stats.borrow_mut().live_decoders -= 1;
    }
}

/// Conversion context of a [`ScriptedBackend`].
#[derive(Debug)]
pub struct ScriptedConverter {
    stats: SharedStats,
    width: u32,
    height: u32,
    order: ChannelOrder,
}

impl PictureConverter for ScriptedConverter {
    type Picture = ScriptedPicture;

    fn convert(
        &mut self,
        picture: &ScriptedPicture,
        output: &mut [u8],
        stride: usize,
    ) -> Result<(), BackendError> {
        let frame = picture
            .frame
            .ok_or_else(|| BackendError::new("picture slot is empty"))?;

        let [red, green, blue] = self.order.offsets();
        for y in 0..self.height {
            for x in 0..self.width {
                let start = y as usize * stride + x as usize * 3;
                let pixel = output
                    .get_mut(start..start + 3)
                    .ok_or_else(|| BackendError::new("output buffer is too small"))?;
                let color = ScriptedBackend::expected_pixel(frame, x, y);
                pixel[red] = color[0];
                pixel[green] = color[1];
                pixel[blue] = color[2];
            }
        }

        self.stats.borrow_mut().conversions += 1;
        Ok(())
    }
}

impl Drop for ScriptedConverter {
    fn drop(&mut self) {
        self.stats.borrow_mut().live_converters -= 1;
    }
}
