//! Benchmarks for sequential reads, exact seeks and keyframe seeks.
//!
//! Run with: cargo bench
//!
//! The scripted benchmarks need nothing on disk. The FFmpeg benchmarks
//! require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use frameseek::{PixelBuffer, StreamSession, scripted::ScriptedBackend};

const FRAME_COUNT: usize = 600;
const KEYFRAME_INTERVAL: usize = 60;

fn scripted_backend() -> ScriptedBackend {
    ScriptedBackend::new(FRAME_COUNT)
        .with_keyframe_interval(KEYFRAME_INTERVAL)
        .with_dimensions(64, 36)
}

fn benchmark_sequential_read(criterion: &mut Criterion) {
    criterion.bench_function("scripted: read all frames", |bencher| {
        bencher.iter(|| {
            let mut session =
                StreamSession::open_with(scripted_backend(), "bench.mp4").unwrap();
            let mut buffer = PixelBuffer::new(64, 36);
            let mut frames = 0;
            while session.read_next_frame_into(&mut buffer).unwrap() {
                frames += 1;
            }
            black_box(frames)
        });
    });
}

fn benchmark_exact_seek(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("scripted: seek_frame");

    // Offsets into a group of pictures: distance decoded after the seek.
    for offset in [0, 5, 30, 59] {
        group.bench_with_input(BenchmarkId::from_parameter(offset), &offset, |bencher, &offset| {
            let mut session =
                StreamSession::open_with(scripted_backend(), "bench.mp4").unwrap();
            let mut buffer = PixelBuffer::new(64, 36);
            let mut group_index = 0;
            bencher.iter(|| {
                group_index = (group_index + 3) % (FRAME_COUNT / KEYFRAME_INTERVAL);
                let target = (group_index * KEYFRAME_INTERVAL + offset) as i64;
                assert!(session.seek_frame(target).unwrap());
                session.fetch_picture(&mut buffer).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_keyframe_seek(criterion: &mut Criterion) {
    criterion.bench_function("scripted: seek_key_frame", |bencher| {
        let mut session = StreamSession::open_with(scripted_backend(), "bench.mp4").unwrap();
        let mut target = 0;
        bencher.iter(|| {
            target = (target + 137) % FRAME_COUNT as i64;
            black_box(session.seek_key_frame(target).unwrap())
        });
    });
}

#[cfg(feature = "ffmpeg")]
fn benchmark_ffmpeg(criterion: &mut Criterion) {
    use std::path::Path;

    use frameseek::{FfmpegBackend, FfmpegLogLevel, FfmpegSession};

    const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let backend = || FfmpegBackend::new().with_log_level(FfmpegLogLevel::Error);

    criterion.bench_function("ffmpeg: read frame 0", |bencher| {
        bencher.iter(|| {
            let mut session = FfmpegSession::open_with(backend(), SAMPLE_VIDEO).unwrap();
            black_box(session.read_frame(0).unwrap())
        });
    });

    criterion.bench_function("ffmpeg: read frame 75 (mid-video seek)", |bencher| {
        bencher.iter(|| {
            let mut session = FfmpegSession::open_with(backend(), SAMPLE_VIDEO).unwrap();
            black_box(session.read_frame(75).unwrap())
        });
    });
}

#[cfg(not(feature = "ffmpeg"))]
fn benchmark_ffmpeg(_criterion: &mut Criterion) {}

criterion::criterion_group!(
    benches,
    benchmark_sequential_read,
    benchmark_exact_seek,
    benchmark_keyframe_seek,
    benchmark_ffmpeg,
);
criterion::criterion_main!(benches);
