use std::hint::black_box;
use std::io::Cursor;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use visual_assistant::feature::FeatureExtractor;

fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) % 256) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(vec![]);
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn benchmark_extract(c: &mut Criterion) {
    let extractor = FeatureExtractor;
    let img = gradient(1280, 720);
    let png = encode(&img, ImageFormat::Png);
    let jpg = encode(&img, ImageFormat::Jpeg);
    let batch = vec![png.clone(); 8];

    let mut group = c.benchmark_group("特征提取");
    group.throughput(Throughput::Elements(1));
    group.bench_function("直方图", |b| b.iter(|| extractor.extract(black_box(&img))));
    group.bench_function("PNG 解码 + 直方图", |b| {
        b.iter(|| extractor.extract_bytes(black_box(&png)).unwrap())
    });
    group.bench_function("JPEG 解码 + 直方图", |b| {
        b.iter(|| extractor.extract_bytes(black_box(&jpg)).unwrap())
    });
    group.finish();

    let mut group = c.benchmark_group("批量特征提取");
    group.throughput(Throughput::Elements(batch.len() as u64));
    group.bench_function("8 张 PNG", |b| {
        b.iter(|| extractor.extract_batch(black_box(&batch)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, benchmark_extract);
criterion_main!(benches);
