#[path = "../util/util.rs"]
mod util;

use util::bench_images;

use std::time::Duration;

use criterion::{
    criterion_group, criterion_main, measurement::WallTime, Bencher, BenchmarkId, Criterion,
    SamplingMode,
};
use image::RgbaImage;
use pixelforge::{
    scan::{scan_ordered, scan_parallel, MAX_WORKERS},
    DistinctColors,
};

fn bench(c: &mut Criterion, group: &str, mut f: impl FnMut(&mut Bencher<WallTime>, &RgbaImage)) {
    let mut group = c.benchmark_group(group);
    group
        .sample_size(30)
        .noise_threshold(0.05)
        .sampling_mode(SamplingMode::Flat)
        .warm_up_time(Duration::from_millis(500));

    for (name, image) in bench_images() {
        let (width, height) = image.dimensions();
        group.bench_with_input(
            BenchmarkId::new(name, format!("{width}x{height}")),
            image,
            &mut f,
        );
    }
}

fn scan_single(c: &mut Criterion) {
    bench(c, "scan_single", |b, image| b.iter(|| scan_ordered(image)));
}

fn scan_par(c: &mut Criterion) {
    bench(c, "scan_par", |b, image| {
        b.iter(|| scan_parallel(image, MAX_WORKERS).unwrap());
    });
}

fn distinct_single(c: &mut Criterion) {
    bench(c, "distinct_single", |b, image| {
        let samples = scan_ordered(image);
        b.iter(|| DistinctColors::new(samples.iter().copied()));
    });
}

fn distinct_par(c: &mut Criterion) {
    bench(c, "distinct_par", |b, image| {
        let samples = scan_ordered(image);
        b.iter(|| DistinctColors::new_par(&samples));
    });
}

criterion_group!(benches, scan_single, scan_par, distinct_single, distinct_par);
criterion_main!(benches);
