use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use relearn_ddpg::{Coordinator, Prng, TransitionStore};

const STATE_DIM: usize = 3;

fn filled_store(capacity: usize) -> TransitionStore {
    let store = TransitionStore::new(capacity, STATE_DIM).unwrap();
    for i in 0..capacity {
        let x = i as f32;
        store.store(&[x; STATE_DIM], x, &[x + 1.0; STATE_DIM]).unwrap();
    }
    store
}

fn store_transition(c: &mut Criterion) {
    let store = filled_store(10_000);
    c.bench_function("store_transition", |b| {
        b.iter(|| store.store(black_box(&[0.5; STATE_DIM]), 1.0, &[0.25; STATE_DIM]))
    });
}

fn sample_batch(c: &mut Criterion) {
    let store = filled_store(10_000);
    let mut rng = Prng::seed_from_u64(0);
    let mut group = c.benchmark_group("sample_batch");
    for batch_size in [32, 128, 512] {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &n| b.iter(|| store.sample(n, &mut rng)),
        );
    }
    group.finish();
}

/// Sampling while another thread stores as fast as it can.
fn sample_contended(c: &mut Criterion) {
    let store = filled_store(10_000);
    let coord = Coordinator::new();
    let mut rng = Prng::seed_from_u64(1);
    crossbeam::scope(|scope| {
        scope.spawn(|_| {
            let row = [0.5; STATE_DIM];
            while !coord.should_stop() {
                store.store(&row, 1.0, &row).unwrap();
            }
        });
        c.bench_function("sample_contended", |b| {
            b.iter(|| store.sample(128, &mut rng))
        });
        coord.request_stop();
    })
    .unwrap();
}

criterion_group!(benches, store_transition, sample_batch, sample_contended);
criterion_main!(benches);
