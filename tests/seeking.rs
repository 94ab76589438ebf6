//! Seeking integration tests.
//!
//! Exact seeks, keyframe seeks, the short-forward-hop shortcut and the
//! overshoot re-seek path, all against the scripted backend.

use frameseek::{FrameSeekError, SessionOptions, StreamSession, scripted::ScriptedBackend};

fn open(backend: ScriptedBackend) -> StreamSession<ScriptedBackend> {
    StreamSession::open_with(backend, "seek.mp4").expect("Failed to open scripted stream")
}

fn open_with_options(
    backend: ScriptedBackend,
    options: SessionOptions,
) -> StreamSession<ScriptedBackend> {
    let mut session = StreamSession::with_options(backend, options);
    session.open("seek.mp4").expect("Failed to open scripted stream");
    session
}

// ── exact seeks ────────────────────────────────────────────────────

#[test]
fn seek_frame_lands_on_keyframe_then_decodes_forward() {
    let backend = ScriptedBackend::new(10).with_keyframes([0, 5]);
    let stats = backend.clone();
    let mut session = open(backend);

    assert!(session.seek_frame(7).expect("Seek failed"));
    assert!(session.has_pending_frame());

    let stats = stats.stats();
    assert_eq!(stats.seek_landings, vec![5]);
    assert_eq!(stats.decoded_frames, vec![5, 6, 7]);
    assert_eq!(stats.decoder_resets, 1);
}

#[test]
fn read_after_seek_returns_the_target_frame() {
    let mut session = open(ScriptedBackend::new(30).with_keyframe_interval(10));

    for target in [17, 3, 29, 10, 11, 0] {
        assert!(session.seek_frame(target).expect("Seek failed"), "frame {target}");
        let frame = session
            .read_next_frame()
            .expect("Read failed")
            .expect("Frame after seek");
        assert_eq!(session.current_decode_timestamp(), Some(target));
        assert_eq!(
            frame.pixel(1, 1),
            Some(ScriptedBackend::expected_pixel(target, 1, 1))
        );
    }
}

#[test]
fn read_frame_returns_exact_frames_in_any_order() {
    let mut session = open(ScriptedBackend::new(20).with_keyframe_interval(6));

    for target in [19, 0, 7, 6, 12, 2] {
        let frame = session
            .read_frame(target)
            .expect("Read failed")
            .expect("Frame in range");
        assert_eq!(
            frame.pixel(0, 0),
            Some(ScriptedBackend::expected_pixel(target, 0, 0))
        );
    }
}

#[test]
fn seek_past_the_end_reports_false() {
    let mut session = open(ScriptedBackend::new(10).with_keyframes([0, 5]));

    assert!(!session.seek_frame(40).expect("Seek failed"));
    assert!(session.read_frame(40).expect("Read failed").is_none());
}

// ── short forward hops ─────────────────────────────────────────────

#[test]
fn short_forward_hop_decodes_without_seeking() {
    let backend = ScriptedBackend::new(20).with_keyframes([0, 10]);
    let stats = backend.clone();
    let mut session = open(backend);

    session.read_next_frame().expect("Read failed");
    assert!(session.seek_frame(5).expect("Seek failed"));

    let stats = stats.stats();
    assert_eq!(stats.seek_calls, 0);
    assert_eq!(stats.decoded_frames, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn hop_beyond_threshold_seeks() {
    let backend = ScriptedBackend::new(20).with_keyframes([0, 10]);
    let stats = backend.clone();
    let mut session = open(backend);

    assert!(session.seek_frame(6).expect("Seek failed"));
    assert_eq!(stats.stats().seek_calls, 1);
}

#[test]
fn threshold_is_configurable() {
    let backend = ScriptedBackend::new(20).with_keyframes([0, 10]);
    let stats = backend.clone();
    let options = SessionOptions::new().with_forward_decode_threshold(15);
    let mut session = open_with_options(backend, options);

    assert!(session.seek_frame(12).expect("Seek failed"));
    assert_eq!(stats.stats().seek_calls, 0);
}

#[test]
fn backward_seek_always_seeks() {
    let backend = ScriptedBackend::new(20).with_keyframes([0, 10]);
    let stats = backend.clone();
    let mut session = open(backend);

    assert!(session.seek_frame(14).expect("Seek failed"));
    session.read_next_frame().expect("Read failed");
    assert!(session.seek_frame(12).expect("Seek failed"));

    let stats = stats.stats();
    assert_eq!(stats.seek_calls, 2);
    assert_eq!(stats.seek_landings, vec![10, 10]);
}

// ── already positioned ─────────────────────────────────────────────

#[test]
fn pending_target_needs_no_further_decoding() {
    let backend = ScriptedBackend::new(10).with_keyframes([0, 5]);
    let stats = backend.clone();
    let mut session = open(backend);

    assert!(session.seek_frame(7).expect("Seek failed"));
    let calls = stats.stats().decode_calls;

    assert!(session.seek_frame(7).expect("Seek failed"));
    assert_eq!(stats.stats().decode_calls, calls);
    assert_eq!(stats.stats().seek_calls, 1);
}

#[test]
fn fresh_session_seek_to_zero_decodes_first_frame() {
    let backend = ScriptedBackend::new(10);
    let stats = backend.clone();
    let mut session = open(backend);

    assert!(session.seek_frame(0).expect("Seek failed"));
    assert_eq!(stats.stats().seek_calls, 0);
    assert_eq!(stats.stats().decoded_frames, vec![0]);
}

#[test]
fn consumed_target_is_decoded_again_after_reseek() {
    let backend = ScriptedBackend::new(10).with_keyframes([0, 5]);
    let stats = backend.clone();
    let mut session = open(backend);

    for _ in 0..4 {
        session.read_next_frame().expect("Read failed");
    }
    assert_eq!(session.current_decode_timestamp(), Some(3));

    assert!(session.seek_frame(3).expect("Seek failed"));
    let frame = session
        .read_next_frame()
        .expect("Read failed")
        .expect("Frame 3 again");
    assert_eq!(frame.pixel(0, 0), Some(ScriptedBackend::expected_pixel(3, 0, 0)));

    let stats = stats.stats();
    assert_eq!(stats.seek_landings, vec![0]);
    assert_eq!(stats.decoded_frames, vec![0, 1, 2, 3, 4, 0, 1, 2, 3]);
}

#[test]
fn reseek_cap_turns_overshoot_into_seek_error() {
    let backend = ScriptedBackend::new(10);
    let options = SessionOptions::new().with_max_reseek_attempts(0);
    let mut session = open_with_options(backend, options);

    session.read_next_frame().expect("Read failed");
    session.read_next_frame().expect("Read failed");

    let error = session.seek_frame(1).expect_err("Cap of zero re-seeks");
    assert!(matches!(error, FrameSeekError::Seek { target: 1, .. }));

    // The session keeps going from where it stopped.
    let frame = session
        .read_next_frame()
        .expect("Read failed")
        .expect("Overshot frame is pending");
    assert_eq!(frame.pixel(0, 0), Some(ScriptedBackend::expected_pixel(2, 0, 0)));
}

#[test]
fn decoder_moving_backwards_is_a_seek_error() {
    let backend = ScriptedBackend::new(5).with_decode_timestamps([0, 1, 2, 1, 4]);
    let mut session = open(backend);

    for _ in 0..3 {
        session.read_next_frame().expect("Read failed");
    }
    assert_eq!(session.current_decode_timestamp(), Some(2));

    let error = session.seek_frame(2).expect_err("Timestamps went backwards");
    assert!(matches!(error, FrameSeekError::Seek { target: 2, .. }));
    assert!(error.to_string().contains("backwards"));

    assert!(session.is_open());
    assert!(session.read_next_frame().expect("Read failed").is_some());
}

#[test]
fn read_frame_maps_unreachable_target_to_none() {
    let backend = ScriptedBackend::new(5).with_decode_timestamps([0, 1, 2, 1, 4]);
    let mut session = open(backend);

    for _ in 0..3 {
        session.read_next_frame().expect("Read failed");
    }
    assert!(session.read_frame(2).expect("Read failed").is_none());
}

// ── keyframe seeks ─────────────────────────────────────────────────

#[test]
fn seek_key_frame_returns_keyframe_at_or_before_target() {
    let backend = ScriptedBackend::new(30).with_keyframe_interval(8);
    let stats = backend.clone();
    let mut session = open(backend);

    for (target, keyframe) in [(7, 0), (8, 8), (20, 16), (29, 24)] {
        let landed = session
            .seek_key_frame(target)
            .expect("Seek failed")
            .expect("Keyframe seek accepted");
        assert_eq!(landed, keyframe);
        assert!(landed <= target);
    }

    // One decode per keyframe seek, never the exact target.
    assert_eq!(stats.stats().decoded_frames, vec![0, 8, 16, 24]);
}

#[test]
fn keyframe_picture_can_be_fetched() {
    let mut session = open(ScriptedBackend::new(30).with_keyframe_interval(8));

    assert_eq!(session.seek_key_frame(13).expect("Seek failed"), Some(8));
    let frame = session
        .read_next_frame()
        .expect("Read failed")
        .expect("Pending keyframe");
    assert_eq!(frame.pixel(2, 1), Some(ScriptedBackend::expected_pixel(8, 2, 1)));
}

// ── refused seeks ──────────────────────────────────────────────────

#[test]
fn refused_coarse_seek() {
    let mut session = open(ScriptedBackend::new(20).failing_seeks());

    let error = session.seek_frame(15).expect_err("Backend refuses seeks");
    assert!(matches!(error, FrameSeekError::Seek { target: 15, .. }));

    assert_eq!(session.seek_key_frame(15).expect("No hard error"), None);
    assert!(session.read_frame(15).expect("No hard error").is_none());

    // Short hops never needed the backend seek.
    assert!(session.seek_frame(3).expect("Seek failed"));
}

#[test]
fn seeks_on_closed_session_fail() {
    let mut session = StreamSession::new(ScriptedBackend::new(5));

    assert!(matches!(session.seek_frame(1), Err(FrameSeekError::NotOpen)));
    assert!(matches!(session.seek_key_frame(1), Err(FrameSeekError::NotOpen)));
    assert!(matches!(session.read_frame(1), Err(FrameSeekError::NotOpen)));
}
