//! FFmpeg backend integration tests.
//!
//! Tests that need media require fixture files from
//! `tests/fixtures/generate_fixtures.sh` and return early without them.

#![cfg(feature = "ffmpeg")]

use std::path::Path;

use frameseek::{FfmpegSession, FrameSeekError, PixelBuffer};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn sample_audio_only_path() -> &'static str {
    "tests/fixtures/sample_audio_only.mp4"
}

// ── open failures ──────────────────────────────────────────────────

#[test]
fn open_nonexistent_file() {
    let error = FfmpegSession::open_file("this_file_does_not_exist.mp4")
        .expect_err("Missing file should not open");
    assert!(
        matches!(error, FrameSeekError::Open { .. }),
        "Expected Open error, got {error:?}"
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegSession::open_file(&invalid_file_path);
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn audio_only_file_has_no_video_track() {
    let path = sample_audio_only_path();
    if !Path::new(path).exists() {
        return;
    }

    let error = FfmpegSession::open_file(path).expect_err("No video track");
    assert!(matches!(error, FrameSeekError::NoVideoTrack));
}

// ── metadata ───────────────────────────────────────────────────────

#[test]
fn fixture_metadata() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = FfmpegSession::open_file(path).expect("Failed to open fixture");
    let metadata = session.metadata().expect("Open session");

    assert_eq!((metadata.width, metadata.height), (320, 240));
    assert!((metadata.frames_per_second() - 30.0).abs() < 0.01);
    assert!(metadata.frame_count >= 140, "{} frames", metadata.frame_count);
    assert!(!metadata.codec_name.is_empty());
}

// ── reading and seeking ────────────────────────────────────────────

#[test]
fn sequential_frame_numbers_increase() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut session = FfmpegSession::open_file(path).expect("Failed to open fixture");
    let mut buffer = PixelBuffer::new(320, 240);
    let mut previous = -1;
    let mut count = 0;
    while session.read_next_frame_into(&mut buffer).expect("Read failed") {
        let current = session.current_decode_timestamp().expect("Open session");
        assert!(current >= previous, "{current} after {previous}");
        previous = current;
        count += 1;
    }

    let expected = session.frame_count().expect("Open session");
    assert!(count as u64 + 2 >= expected, "read {count} of ~{expected} frames");
}

#[test]
fn exact_seek_matches_sequential_decode() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let target = 75;
    let mut sequential = FfmpegSession::open_file(path).expect("Failed to open fixture");
    let mut expected = None;
    while let Some(frame) = sequential.read_next_frame().expect("Read failed") {
        if sequential.current_decode_timestamp() == Some(target) {
            expected = Some(frame);
            break;
        }
    }
    let expected = expected.expect("Fixture has frame 75");

    let mut seeking = FfmpegSession::open_file(path).expect("Failed to open fixture");
    let actual = seeking
        .read_frame(target)
        .expect("Read failed")
        .expect("Frame 75 reachable");
    assert_eq!(seeking.current_decode_timestamp(), Some(target));
    assert_eq!(actual, expected);
}

#[test]
fn keyframe_seek_lands_at_or_before_target() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut session = FfmpegSession::open_file(path).expect("Failed to open fixture");
    let landed = session
        .seek_key_frame(100)
        .expect("Seek failed")
        .expect("Seek accepted");
    assert!(landed <= 100, "landed on {landed}");

    let mut buffer = PixelBuffer::new(320, 240);
    assert!(session.fetch_picture(&mut buffer).expect("Fetch failed"));
}

#[test]
fn seek_past_end_reports_no_frame() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut session = FfmpegSession::open_file(path).expect("Failed to open fixture");
    assert!(session.read_frame(1_000_000).expect("Read failed").is_none());
}
