use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use lattice_di::ContainerBuilder;
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_shared_hit(c: &mut Criterion) {
    let mut builder = ContainerBuilder::new();
    builder.register_instance(42u64);
    let container = builder.build().unwrap();

    // Prime the root cache
    let _ = container.resolve::<u64>().unwrap();

    c.bench_function("shared_hit_u64", |b| {
        b.iter(|| {
            let v = container.resolve::<u64>().unwrap();
            black_box(v);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let mut builder = ContainerBuilder::new();
                builder.register_singleton_factory::<ExpensiveToCreate, _>(|_| {
                    Ok(ExpensiveToCreate {
                        data: (0..1000).collect(),
                    })
                });
                builder.build().unwrap()
            },
            |container| {
                let v = container.resolve::<ExpensiveToCreate>().unwrap();
                black_box(v.data.len());
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_scoped_vs_transient(c: &mut Criterion) {
    struct Service {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("scoped_vs_transient");

    let mut builder = ContainerBuilder::new();
    builder.register_scoped_factory::<Service, _>(|_| Ok(Service { data: [0; 64] }));
    let container = builder.build().unwrap();
    let scope = container.begin_scope().unwrap();

    group.bench_function("scoped_hit", |b| {
        b.iter(|| {
            let v = scope.resolve::<Service>().unwrap();
            black_box(&v.data);
        })
    });

    let mut builder = ContainerBuilder::new();
    builder.register_transient_factory::<Service, _>(|_| Ok(Service { data: [0; 64] }));
    let container = builder.build().unwrap();

    group.bench_function("transient", |b| {
        b.iter(|| {
            let v = container.resolve::<Service>().unwrap();
            black_box(&v.data);
        })
    });

    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    struct Level1;
    struct Level2 {
        _inner: Arc<Level1>,
    }
    struct Level3 {
        _inner: Arc<Level2>,
    }
    struct Level4 {
        _inner: Arc<Level3>,
    }

    let mut builder = ContainerBuilder::new();
    builder.register_transient_factory::<Level1, _>(|_| Ok(Level1));
    builder.register_transient_factory::<Level2, _>(|ctx| {
        Ok(Level2 {
            _inner: ctx.resolve::<Level1>()?,
        })
    });
    builder.register_transient_factory::<Level3, _>(|ctx| {
        Ok(Level3 {
            _inner: ctx.resolve::<Level2>()?,
        })
    });
    builder.register_transient_factory::<Level4, _>(|ctx| {
        Ok(Level4 {
            _inner: ctx.resolve::<Level3>()?,
        })
    });
    let container = builder.build().unwrap();

    c.bench_function("transient_chain_depth_4", |b| {
        b.iter(|| {
            let v = container.resolve::<Level4>().unwrap();
            black_box(v);
        })
    });
}

fn bench_scope_churn(c: &mut Criterion) {
    struct Session;

    let mut builder = ContainerBuilder::new();
    builder.register_scoped_factory::<Session, _>(|_| Ok(Session));
    let container = builder.build().unwrap();

    c.bench_function("scope_create_resolve_dispose", |b| {
        b.iter(|| {
            let scope = container.begin_scope().unwrap();
            let v = scope.resolve::<Session>().unwrap();
            black_box(&v);
            scope.dispose();
        })
    });
}

fn bench_shared_hit_contended(c: &mut Criterion) {
    struct Shared;

    let mut builder = ContainerBuilder::new();
    builder.register_singleton_factory::<Shared, _>(|_| Ok(Shared));
    let container = builder.build().unwrap();
    let _ = container.resolve::<Shared>().unwrap();

    c.bench_function("shared_hit_4_threads", |b| {
        b.iter(|| {
            crossbeam_utils::thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|_| {
                        for _ in 0..100 {
                            black_box(container.resolve::<Shared>().unwrap());
                        }
                    });
                }
            })
            .unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_shared_hit,
    bench_singleton_cold,
    bench_scoped_vs_transient,
    bench_dependency_chain,
    bench_scope_churn,
    bench_shared_hit_contended,
);
criterion_main!(benches);
