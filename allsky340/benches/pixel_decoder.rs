use allsky340::{Crop, Image};
use criterion::{criterion_group, criterion_main, Criterion};
use utilities::{interleave, scan_pixels};

fn bench_decoding_images(c: &mut Criterion) {
    let full = interleave(&scan_pixels(Crop::Full));
    let cropped = interleave(&scan_pixels(Crop::Cropped));
    c.bench_function("full frame", |b| b.iter(|| Image::decode(&full, Crop::Full)));
    c.bench_function("cropped frame", |b| b.iter(|| Image::decode(&cropped, Crop::Cropped)));
}

criterion_group!(benches, bench_decoding_images);
criterion_main!(benches);
