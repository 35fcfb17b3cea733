//! Compile and decompile throughput for common filter shapes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ldap_filter::{compile_filter, compile_to_bytes, decompile_bytes, decompile_filter};

const FILTERS: [(&str, &str); 11] = [
    ("and", "(&(sn=Miller)(givenName=Bob))"),
    ("or", "(|(sn=Miller)(givenName=Bob))"),
    ("not", "(!(sn=Miller))"),
    ("equality", "(sn=Miller)"),
    ("initial", "(sn=Mill*)"),
    ("final", "(sn=*Mill)"),
    ("any", "(sn=*Mill*)"),
    ("greater_or_equal", "(sn>=Miller)"),
    ("less_or_equal", "(sn<=Miller)"),
    ("present", "(sn=*)"),
    ("approx", "(sn~=Miller)"),
];

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for (name, text) in FILTERS {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| compile_filter(black_box(text)))
        });
    }
    group.finish();
}

fn bench_decompile(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompile");
    for (name, text) in FILTERS {
        let packet = compile_filter(text).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &packet, |b, packet| {
            b.iter(|| decompile_filter(black_box(packet)))
        });
    }
    group.finish();
}

fn bench_decompile_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompile_bytes");
    for (name, text) in FILTERS {
        let bytes = compile_to_bytes(text).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decompile_bytes(black_box(bytes)))
        });
    }
    group.finish();
}

/// A wide OR of 500 equality clauses.
fn bench_wide_filter(c: &mut Criterion) {
    let clauses: String = (0..500).map(|i| format!("(uid=user{})", i)).collect();
    let text = format!("(|{})", clauses);
    let bytes = compile_to_bytes(&text).unwrap();

    c.bench_function("compile_wide_or", |b| b.iter(|| compile_filter(black_box(&text))));
    c.bench_function("decompile_bytes_wide_or", |b| {
        b.iter(|| decompile_bytes(black_box(&bytes)))
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_decompile,
    bench_decompile_bytes,
    bench_wide_filter
);
criterion_main!(benches);
