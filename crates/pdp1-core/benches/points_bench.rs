//! Criterion benchmarks for the display point-record decoder.
//!
//! The display streams up to 128 records per read at refresh rate, so one
//! full batch must decode well inside a frame.
//!
//! Run with:
//! ```bash
//! cargo bench --package pdp1-core --bench points_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdp1_core::protocol::points::{decode_points, PointDecoder, MAX_BATCH_BYTES};

fn make_stream(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn bench_decode_full_batch(c: &mut Criterion) {
    let bytes = make_stream(MAX_BATCH_BYTES);
    c.bench_function("decode_points/full_batch", |b| {
        b.iter(|| decode_points(black_box(&bytes)))
    });
}

fn bench_decoder_split_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_decoder/split_reads");
    let stream = make_stream(MAX_BATCH_BYTES * 16);

    // Odd read sizes force the decoder to carry partial records.
    for read_size in [61usize, 257, MAX_BATCH_BYTES] {
        group.bench_with_input(BenchmarkId::from_parameter(read_size), &read_size, |b, &n| {
            b.iter(|| {
                let mut decoder = PointDecoder::new();
                let mut total = 0usize;
                for chunk in stream.chunks(n) {
                    total += decoder.feed(black_box(chunk)).len();
                }
                total
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode_full_batch, bench_decoder_split_reads);
criterion_main!(benches);
