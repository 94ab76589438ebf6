//! # frameseek
//!
//! Frame-accurate random access to the video track of a media container.
//!
//! `frameseek` opens a container, finds its first video track and hands out
//! decoded frames as packed 24-bit pixels, either sequentially or by frame
//! index. Random access seeks to the nearest keyframe at or before the
//! target and decodes forward, so the frame returned is exactly the one
//! asked for. Short forward jumps are served by sequential decode without
//! a seek.
//!
//! Decoding is delegated to a [`MediaBackend`]. The default backend,
//! [`FfmpegBackend`], is built on
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next).
//! [`ScriptedBackend`](scripted::ScriptedBackend) is a deterministic
//! in-memory backend for tests and benchmarks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use frameseek::FfmpegSession;
//!
//! let mut session = FfmpegSession::open_file("input.mp4")?;
//! println!(
//!     "{}x{} at {:.2} fps",
//!     session.width().unwrap_or(0),
//!     session.height().unwrap_or(0),
//!     session.frames_per_second().unwrap_or(0.0),
//! );
//!
//! // Exact frame by index.
//! if let Some(frame) = session.read_frame(250)? {
//!     frame.to_rgb_image().save("frame_250.png")?;
//! }
//!
//! // Continue sequentially from there.
//! while let Some(frame) = session.read_next_frame()? {
//!     let _ = frame.pixel(0, 0);
//! }
//! # Ok::<(), frameseek::FrameSeekError>(())
//! ```
//!
//! ## Caller-Provided Buffers
//!
//! The `*_into` methods and [`StreamSession::fetch_picture`] write into a
//! [`PixelBuffer`] the caller owns, with any row stride at least
//! `width * 3` bytes:
//!
//! ```
//! use frameseek::{PixelBuffer, StreamSession, scripted::ScriptedBackend};
//!
//! let mut session = StreamSession::new(ScriptedBackend::new(4));
//! session.open("clip")?;
//!
//! let mut buffer = PixelBuffer::with_stride(8, 4, 32)?;
//! assert!(session.read_next_frame_into(&mut buffer)?);
//! assert_eq!(session.current_decode_timestamp(), Some(0));
//! # Ok::<(), frameseek::FrameSeekError>(())
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` (default) | [`FfmpegBackend`] and the `frameseek` command-line tool |
//!
//! ## Requirements
//!
//! The `ffmpeg` feature needs the FFmpeg development libraries installed on
//! the system.

pub mod backend;
pub mod config;
pub mod conversion;
mod decode;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod metadata;
mod packet;
pub mod scripted;
mod seek;
pub mod session;
mod utilities;

pub use backend::{
    DecodeStatus, Demuxer, MediaBackend, MediaKind, Packet, PictureConverter, PictureDecoder,
    TrackInfo,
};
pub use config::{ChannelOrder, SessionOptions};
pub use conversion::{BYTES_PER_PIXEL, PixelBuffer};
pub use error::{BackendError, FrameSeekError};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegBackend, FfmpegLogLevel, FfmpegSession};
pub use metadata::{FrameRate, StreamMetadata};
pub use session::StreamSession;
