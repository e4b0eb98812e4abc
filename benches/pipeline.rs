use std::{hint::black_box, sync::Arc};

use criterion::{Criterion, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use vada_scope::{VadaAnalyzer, style_transfer::Passthrough};

fn synthetic_vada() -> DynamicImage {
    let mut image = RgbImage::from_pixel(256, 256, Rgb([170, 200, 235]));
    draw_filled_circle_mut(&mut image, (128, 128), 90, Rgb([200, 130, 60]));
    draw_filled_circle_mut(&mut image, (128, 128), 18, Rgb([20, 20, 20]));
    DynamicImage::ImageRgb8(image)
}

fn bench_evaluate(c: &mut Criterion) {
    let analyzer = VadaAnalyzer::new(Arc::new(Passthrough));
    let image = synthetic_vada();

    c.bench_function("evaluate_256", |b| {
        b.iter(|| analyzer.evaluate(black_box(&image)).map(|e| e.scores.vpi))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_evaluate
}
criterion_main!(benches);
