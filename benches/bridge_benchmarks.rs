//! Benchmarks for moving numeric arrays across the bridge.
//!
//! - Decode: aliasing host arrays of increasing size as matrices. The cost
//!   should stay flat, since no element is copied.
//! - Encode: returning an aliased matrix (flat) versus copying a matrix the
//!   bridge did not allocate (linear in size).

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use cvbind::prelude::*;
use cvbind::core::{array_from_mat, mat_from_array};

const SIDES: [usize; 4] = [8, 64, 512, 2048];

fn decode_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for side in SIDES {
        let image = NumArray::zeros(DType::UInt8, &[side, side, 3]);
        group.throughput(Throughput::Bytes((side * side * 3) as u64));
        group.bench_with_input(BenchmarkId::new("image_u8c3", side), &image, |b, image| {
            b.iter(|| {
                let mat = mat_from_array(black_box(image)).unwrap();
                black_box(mat.total())
            });
        });
    }

    let image = NumArray::zeros(DType::Float32, &[512, 512]);
    group.bench_function("row_stepped_f32", |b| {
        let view = image.step(0, 2).unwrap();
        b.iter(|| black_box(mat_from_array(black_box(&view)).unwrap()));
    });

    group.bench_function("rejected_transpose", |b| {
        let view = image.transpose();
        b.iter(|| black_box(mat_from_array(black_box(&view)).is_err()));
    });

    group.finish();
}

fn encode_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for side in SIDES {
        let bytes = (side * side * 3) as u64;
        group.throughput(Throughput::Bytes(bytes));

        let aliased = mat_from_array(&NumArray::zeros(DType::UInt8, &[side, side, 3])).unwrap();
        group.bench_with_input(BenchmarkId::new("aliased", side), &aliased, |b, m| {
            b.iter(|| black_box(array_from_mat(black_box(m))));
        });

        let foreign = Mat::zeros(&[side, side], MatType::new(Depth::U8, 3)).unwrap();
        group.bench_with_input(BenchmarkId::new("copied", side), &foreign, |b, m| {
            b.iter(|| black_box(array_from_mat(black_box(m))));
        });
    }

    group.finish();
}

criterion_group!(benches, decode_benchmarks, encode_benchmarks);
criterion_main!(benches);
