//! Benchmark: scheduling throughput at various window sizes.
//!
//! Feeds 720p YUV 4:2:0 frames with duplicate runs of 1-4 through the full
//! scheduler into an in-memory sink, and times frame differencing on its own.
//!
//! Run with: cargo bench --bench scheduler

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use framepace::differ::dissimilarity;
use framepace::processing::comparison_image;
use framepace::{
    Frame, FrameFormat, FrameReader, Framerate, MemorySink, MemorySource, Resolution, Scheduler,
    SchedulerConfig, VideoInfo,
};
use std::hint::black_box;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const FRAMES: usize = 240;

/// Frame whose luma is a moving diagonal ramp
fn ramp_frame(phase: u32) -> Frame {
    let mut frame = Frame::new(WIDTH, HEIGHT, FrameFormat::Yuv420p);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            frame.data[(y * WIDTH + x) as usize] = ((x + y + phase * 37) % 256) as u8;
        }
    }
    frame
}

/// Distinct frames repeated 1 to 4 times
fn clip() -> Vec<Frame> {
    let mut frames = Vec::with_capacity(FRAMES);
    let mut phase = 0;
    while frames.len() < FRAMES {
        let frame = ramp_frame(phase);
        let repeats = (phase % 4 + 1) as usize;
        frames.extend(std::iter::repeat(frame).take(repeats.min(FRAMES - frames.len())));
        phase += 1;
    }
    frames
}

fn bench_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_720p");
    group.sample_size(10);
    group.throughput(Throughput::Elements(FRAMES as u64));

    let frames = clip();
    let info = VideoInfo::new(
        Resolution::new(WIDTH, HEIGHT),
        Framerate::FPS_60,
        FrameFormat::Yuv420p,
    );

    for buffer_size in [3usize, 7, 15] {
        let config = SchedulerConfig::default().with_buffer_size(buffer_size);
        group.bench_with_input(
            BenchmarkId::new("buffer", buffer_size),
            &buffer_size,
            |b, _| {
                b.iter(|| {
                    let source = MemorySource::new(info.clone(), frames.iter().cloned());
                    let mut reader = FrameReader::new(source, config.comparison_scale);
                    let mut sink = MemorySink::new();
                    let summary = Scheduler::new(config.clone())
                        .run(&mut reader, &mut sink)
                        .unwrap();
                    black_box(summary);
                });
            },
        );
    }

    group.finish();
}

fn bench_dissimilarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("dissimilarity_720p");

    let a = ramp_frame(0);
    let b = ramp_frame(1);

    for scale in [1u32, 2, 4, 8] {
        let left = comparison_image(&a, scale).unwrap();
        let right = comparison_image(&b, scale).unwrap();
        group.bench_with_input(BenchmarkId::new("scale", scale), &scale, |bench, _| {
            bench.iter(|| black_box(dissimilarity(&left, &right).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_schedule, bench_dissimilarity);
criterion_main!(benches);
