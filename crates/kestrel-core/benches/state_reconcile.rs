//! Benchmarks for render-state reconciliation and draw dispatch.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kestrel_core::backend::recording::RecordingBackend;
use kestrel_core::color::Color;
use kestrel_core::config::RenderConfig;
use kestrel_core::geometry::Rect;
use kestrel_core::image::ImageFormat;
use kestrel_core::render_state::{RenderState, reconcile};
use kestrel_core::state::{BlendMode, TextureType};
use kestrel_core::{RenderSystem, WindowInfo};

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    group.bench_function("unchanged", |b| {
        let mut backend = RecordingBackend::new();
        let desired = RenderState::device_defaults(false);
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        b.iter(|| reconcile(&desired, &mut device, &mut backend, false));
    });

    group.bench_function("alternating_blend", |b| {
        let mut backend = RecordingBackend::new();
        let mut desired = RenderState::device_defaults(false);
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        let mut add = false;
        b.iter(|| {
            add = !add;
            desired.blend_mode = if add { BlendMode::Add } else { BlendMode::Alpha };
            reconcile(&desired, &mut device, &mut backend, false)
        });
    });

    group.finish();
}

fn bench_draw_quads(c: &mut Criterion) {
    let mut group = c.benchmark_group("draw_textured_rect");

    for n in [10, 100, 1_000] {
        let backend = RecordingBackend::new();
        let rec = backend.recording();
        let mut rs = RenderSystem::new(Box::new(backend), RenderConfig::default());
        rs.create(&WindowInfo::new(640, 480)).unwrap();
        let tex = rs
            .create_texture_filled(8, 8, Color::WHITE, ImageFormat::Rgba, TextureType::Managed)
            .unwrap();
        rs.set_texture(Some(tex));

        group.bench_function(BenchmarkId::new("quads", n), |b| {
            b.iter(|| {
                rec.borrow_mut().reset_counts();
                for i in 0..n {
                    let x = (i % 64) as f32 * 8.0;
                    rs.draw_textured_rect(Rect::new(x, 0.0, 8.0, 8.0), Rect::UNIT);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconcile, bench_draw_quads);
criterion_main!(benches);
