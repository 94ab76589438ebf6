//! Internal utility functions.
//!
//! Helpers for stride-aware row copying and for converting between frame
//! indices and container timestamps.

use crate::metadata::FrameRate;

/// Copy `rows` rows of `row_bytes` bytes between buffers with different
/// strides. Rows that do not fit in either buffer are skipped.
pub(crate) fn copy_rows(
    source: &[u8],
    source_stride: usize,
    destination: &mut [u8],
    destination_stride: usize,
    row_bytes: usize,
    rows: usize,
) {
    if source_stride == row_bytes && destination_stride == row_bytes {
        // No padding on either side: copy the whole plane at once.
        let length = (row_bytes * rows).min(source.len()).min(destination.len());
        destination[..length].copy_from_slice(&source[..length]);
        return;
    }

    for row in 0..rows {
        let source_start = row * source_stride;
        let destination_start = row * destination_stride;
        let (Some(from), Some(to)) = (
            source.get(source_start..source_start + row_bytes),
            destination.get_mut(destination_start..destination_start + row_bytes),
        ) else {
            break;
        };
        to.copy_from_slice(from);
    }
}

/// Rescale a container timestamp in `time_base` units to a frame index.
///
/// Rounds to the nearest frame so that timestamps a tick early or late
/// still map to the intended frame.
#[cfg_attr(not(feature = "ffmpeg"), allow(dead_code))]
pub(crate) fn stream_timestamp_to_frame_number(
    timestamp: i64,
    time_base: FrameRate,
    frame_rate: FrameRate,
) -> i64 {
    let numerator = timestamp as i128 * time_base.numerator as i128 * frame_rate.numerator as i128;
    let denominator = time_base.denominator as i128 * frame_rate.denominator as i128;
    if denominator == 0 {
        return timestamp;
    }
    divide_rounded(numerator, denominator) as i64
}

/// Rescale a frame index to a container timestamp in `time_base` units.
#[cfg_attr(not(feature = "ffmpeg"), allow(dead_code))]
pub(crate) fn frame_number_to_stream_timestamp(
    frame_number: i64,
    time_base: FrameRate,
    frame_rate: FrameRate,
) -> i64 {
    let numerator =
        frame_number as i128 * frame_rate.denominator as i128 * time_base.denominator as i128;
    let denominator = frame_rate.numerator as i128 * time_base.numerator as i128;
    if denominator == 0 {
        return frame_number;
    }
    divide_rounded(numerator, denominator) as i64
}

fn divide_rounded(numerator: i128, denominator: i128) -> i128 {
    let (numerator, denominator) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}
