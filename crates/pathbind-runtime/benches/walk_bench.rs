//! Benchmarks for path walking.
//!
//! Run with: cargo bench -p pathbind-runtime --bench walk_bench

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pathbind_core::test_support::{Model, ModelResolver};
use pathbind_core::{MemberPath, Object, Value};
use pathbind_runtime::{
    MemberPathObserver, ObserverError, ObserverOptions, ObserverProvider, ObserverRequest,
    PathObserverListener,
};

struct Quiet;

impl PathObserverListener for Quiet {
    fn on_path_members_changed(&self, _observer: &dyn MemberPathObserver) {}
    fn on_last_member_changed(&self, _observer: &dyn MemberPathObserver) {}
    fn on_error(&self, _observer: &dyn MemberPathObserver, _error: &ObserverError) {}
}

/// Segment names `P0..P{depth-1}` and a chain of that depth ending in a u64.
fn chain(depth: usize) -> (Arc<ModelResolver>, Object, Vec<Object>, String) {
    let mut resolver = ModelResolver::new();
    for i in 0..depth {
        resolver = resolver.property::<Model>(&format!("P{i}"));
    }
    let mut value = Value::of(0u64);
    let mut nodes = Vec::with_capacity(depth);
    for i in (0..depth).rev() {
        let node = Object::new(Model::new().with(&format!("P{i}"), value));
        nodes.push(node.clone());
        value = Value::Object(node);
    }
    nodes.reverse();
    let root = nodes[0].clone();
    let path = (0..depth)
        .map(|i| format!("P{i}"))
        .collect::<Vec<_>>()
        .join(".");
    (Arc::new(resolver), root, nodes, path)
}

fn bench_pull_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk/pull");
    for depth in [1usize, 3, 8] {
        for stable in [false, true] {
            let (resolver, root, _nodes, path) = chain(depth);
            let provider = ObserverProvider::new(resolver);
            let request = ObserverRequest::new(path)
                .with_options(ObserverOptions::default().with_stable_path(stable));
            let observer = provider.observe(&root, request).unwrap();
            let id = format!("depth{depth}/{}", if stable { "stable" } else { "dynamic" });
            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                b.iter(|| black_box(observer.members(None).all_members_available()));
            });
        }
    }
    group.finish();
}

fn bench_rewalk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk/rewalk_on_change");
    for depth in [2usize, 4, 8] {
        let (resolver, root, nodes, path) = chain(depth);
        let provider = ObserverProvider::new(resolver);
        let observer = provider.observe(&root, path.as_str()).unwrap();
        observer.add_listener(Arc::new(Quiet));
        let first = nodes[0].clone();
        let second = nodes[1].clone();
        group.bench_function(BenchmarkId::from_parameter(depth), |b| {
            b.iter(|| {
                Model::props(&first).set("P0", Value::Object(second.clone()));
            });
        });
    }
    group.finish();
}

fn bench_listener_churn(c: &mut Criterion) {
    let (resolver, root, _nodes, path) = chain(4);
    let provider = ObserverProvider::new(resolver);
    let observer = provider.observe(&root, path.as_str()).unwrap();
    let listener: Arc<dyn PathObserverListener> = Arc::new(Quiet);
    c.bench_function("observer/add_remove_listener", |b| {
        b.iter(|| {
            observer.add_listener(Arc::clone(&listener));
            observer.remove_listener(&listener);
        });
    });
}

fn bench_parse(c: &mut Criterion) {
    let text = "Order.Customer.Addresses[0].Lines[2, 3].City";
    c.bench_function("member_path/parse", |b| {
        b.iter(|| MemberPath::parse(black_box(text)).unwrap());
    });
    let provider = ObserverProvider::new(Arc::new(ModelResolver::new()));
    c.bench_function("member_path/provider_cached", |b| {
        b.iter(|| provider.member_path(black_box(text)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_pull_walk,
    bench_rewalk,
    bench_listener_churn,
    bench_parse
);
criterion_main!(benches);
