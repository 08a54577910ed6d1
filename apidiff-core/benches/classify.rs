//! Benchmarks for loading and classifying Go packages.

use apidiff_core::differ::{DiffPolicy, Differ};
use apidiff_core::parser::{load_package, BuildContext};
use apidiff_core::{MemorySnapshot, SourceFile};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn service_source(version: usize) -> String {
    let mut source = String::from("package svc\n\nimport \"context\"\n\n");
    for i in 0..50 {
        source.push_str(&format!(
            "type Request{i} struct {{\n\tID string\n\tLimit int\n}}\n\n\
             type Handler{i} interface {{\n\tServe(ctx context.Context, req *Request{i}) error\n}}\n\n\
             func Process{i}(ctx context.Context, req Request{i}) (int, error) {{ return 0, nil }}\n\n"
        ));
        if version > 0 && i % 5 == 0 {
            source.push_str(&format!("func Extra{i}(flag bool) {{}}\n\n"));
        }
    }
    source
}

fn bench_load_package(c: &mut Criterion) {
    let files = vec![SourceFile::new("svc.go", service_source(0))];
    let build = BuildContext::default();

    c.bench_function("load_package_150_decls", |b| {
        b.iter(|| black_box(load_package("./svc", &files, &build).ok()))
    });
}

fn bench_diff_snapshots(c: &mut Criterion) {
    let mut old = MemorySnapshot::new("v1");
    let mut new = MemorySnapshot::new("v2");
    let (before, after) = (service_source(0), service_source(1));
    for p in 0..32 {
        let package = format!("./svc{}", p);
        old.add_file(&package, "svc.go", &before);
        new.add_file(&package, "svc.go", &after);
    }
    let differ = Differ::new(DiffPolicy::default());

    c.bench_function("diff_32_packages", |b| {
        b.iter(|| black_box(differ.diff_all(&old, &new).ok()))
    });
}

criterion_group!(benches, bench_load_package, bench_diff_snapshots);
criterion_main!(benches);
