use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pyslot_runtime::builtins::{new_str, pyrt_long_from_i64};
use pyslot_runtime::gil::with_lock;
use pyslot_runtime::object::{pyrt_decref, pyrt_incref, pyrt_object_repr};

fn bench_refcount(c: &mut Criterion) {
    pyslot_runtime::logging::init_runtime_logging();
    pyslot_runtime::pyrt_initialize();

    with_lock(|| {
        let obj = pyrt_long_from_i64(42);

        c.bench_function("incref_decref", |b| {
            b.iter(|| unsafe {
                pyrt_incref(black_box(obj));
                pyrt_decref(black_box(obj));
            });
        });

        c.bench_function("alloc_free_str", |b| {
            b.iter(|| unsafe { pyrt_decref(new_str(black_box("bench"))) });
        });

        c.bench_function("repr_int", |b| {
            b.iter(|| unsafe { pyrt_decref(pyrt_object_repr(black_box(obj))) });
        });

        unsafe { pyrt_decref(obj) };
    });
}

criterion_group!(benches, bench_refcount);
criterion_main!(benches);
