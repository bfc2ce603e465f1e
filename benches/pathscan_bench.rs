use b2extract::recover;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_content_scan(c: &mut Criterion) {
    // 256 KiB of byte noise with one real path buried near the end.
    let mut payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    payload.extend_from_slice(b"/Game/Props/Deep/Nested/M_Target\0");
    c.bench_function("content_scan_256k", |b| {
        b.iter(|| recover::recover(black_box(&payload), "M_Target", false, true))
    });
}

criterion_group!(benches, bench_content_scan);
criterion_main!(benches);
