//! Benchmarks for ff
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_glob_matching(c: &mut Criterion) {
    use ff::ignore::Glob;

    let glob = Glob::new("src/**/*.rs", false).unwrap();
    c.bench_function("glob_match_anchored", |b| {
        b.iter(|| {
            black_box(glob.matches(
                black_box("src/output/records.rs"),
                black_box("records.rs"),
                false,
            ))
        })
    });

    c.bench_function("glob_compile", |b| {
        b.iter(|| Glob::new(black_box("!target/**/*.o"), false).unwrap())
    });
}

fn benchmark_value_parsing(c: &mut Criterion) {
    use ff::types::parse::{parse_duration, parse_mode, parse_size};

    c.bench_function("parse_size", |b| {
        b.iter(|| parse_size(black_box("1.5GiB"), false).unwrap())
    });
    c.bench_function("parse_duration", |b| {
        b.iter(|| parse_duration(black_box("1d12h30m")).unwrap())
    });
    c.bench_function("parse_mode_symbolic", |b| {
        b.iter(|| parse_mode(black_box("u+rwx,g+rx")).unwrap())
    });
}

fn benchmark_expression_parsing(c: &mut Criterion) {
    let tokens: Vec<String> = ["type=f", "(", "ext=rs", "or", "ext=py", ")", "size+=10k"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    c.bench_function("expr_parse", |b| {
        b.iter(|| ff::expr::parse(black_box(&tokens), None).unwrap())
    });
}

fn benchmark_sort_keys(c: &mut Criterion) {
    use ff::types::natural_sort_key;

    c.bench_function("natural_sort_key", |b| {
        b.iter(|| natural_sort_key(black_box("src/module12/file-3.4.5.tar.gz")))
    });
}

criterion_group!(
    benches,
    benchmark_glob_matching,
    benchmark_value_parsing,
    benchmark_expression_parsing,
    benchmark_sort_keys
);
criterion_main!(benches);
