//! Output buffer and channel order tests.

use frameseek::{
    BYTES_PER_PIXEL, ChannelOrder, PixelBuffer, SessionOptions, StreamSession,
    scripted::ScriptedBackend,
};

#[test]
fn packed_buffer_layout() {
    let buffer = PixelBuffer::new(5, 3);

    assert_eq!(buffer.stride(), 5 * BYTES_PER_PIXEL);
    assert_eq!(buffer.as_bytes().len(), 45);
    assert_eq!(buffer.channel_order(), ChannelOrder::Rgb);
    assert!(buffer.row(3).is_none());
    assert!(buffer.pixel(5, 0).is_none());
}

#[test]
fn stride_equal_to_row_size_is_accepted() {
    let buffer = PixelBuffer::with_stride(5, 3, 15).expect("Exact stride");
    assert_eq!(buffer, PixelBuffer::new(5, 3));
}

#[test]
fn bgr_session_writes_blue_first() {
    let options = SessionOptions::new().with_channel_order(ChannelOrder::Bgr);
    let mut session = StreamSession::with_options(ScriptedBackend::new(3), options);
    session.open("bgr.avi").expect("Failed to open");

    session.read_next_frame().expect("Read failed");
    let frame = session
        .read_next_frame()
        .expect("Read failed")
        .expect("Frame 1");

    assert_eq!(frame.channel_order(), ChannelOrder::Bgr);
    let [red, green, blue] = ScriptedBackend::expected_pixel(1, 6, 2);
    let row = frame.row(2).expect("Row in range");
    assert_eq!(&row[18..21], &[blue, green, red]);

    // Accessors always speak RGB.
    assert_eq!(frame.pixel(6, 2), Some([red, green, blue]));
}

#[test]
fn rgb_image_strips_padding_and_restores_order() {
    let options = SessionOptions::new().with_channel_order(ChannelOrder::Bgr);
    let mut session = StreamSession::with_options(ScriptedBackend::new(2), options);
    session.open("bgr.avi").expect("Failed to open");

    let mut buffer = PixelBuffer::with_stride(8, 4, 32).expect("Valid stride");
    assert!(session.read_next_frame_into(&mut buffer).expect("Read failed"));

    let image = buffer.to_rgb_image();
    assert_eq!(image.dimensions(), (8, 4));
    for (x, y, pixel) in image.enumerate_pixels() {
        assert_eq!(pixel.0, ScriptedBackend::expected_pixel(0, x, y), "({x}, {y})");
    }
}

#[test]
fn rgb_image_can_be_saved() {
    let mut session =
        StreamSession::open_with(ScriptedBackend::new(1), "clip.mp4").expect("Failed to open");
    let frame = session
        .read_next_frame()
        .expect("Read failed")
        .expect("Frame 0");

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temporary_directory.path().join("frame.png");
    frame.to_rgb_image().save(&path).expect("Failed to save PNG");

    let reloaded = image::open(&path).expect("Failed to reload PNG").to_rgb8();
    assert_eq!(reloaded, frame.to_rgb_image());
}
