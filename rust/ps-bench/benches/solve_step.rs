use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use ps_bench::flop_config;
use ps_core::{EngineModule, GameManager, VariantKind};
use ps_engine::ReferenceModule;

fn game(kind: VariantKind, threads: usize, compressed: bool) -> Box<dyn GameManager> {
    let mut m = ReferenceModule::new(kind);
    m.init_runtime().unwrap();
    m.init_thread_pool(threads).unwrap();
    let mut g = m.new_game_manager().unwrap();
    g.init(flop_config()).unwrap();
    g.allocate_memory(compressed).unwrap();
    g
}

fn bench_solve_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("ps_engine_solve_step");
    for kind in [VariantKind::Baseline, VariantKind::Accelerated] {
        for compressed in [false, true] {
            let id = format!("{kind}{}", if compressed { "_compressed" } else { "" });
            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                let mut g = game(kind, 2, compressed);
                let mut i = 0u32;
                b.iter(|| {
                    g.solve_step(i).unwrap();
                    i = i.wrapping_add(1);
                })
            });
        }
    }
    group.finish();

    c.bench_function("ps_engine_init_flop", |b| {
        let mut m = ReferenceModule::new(VariantKind::Baseline);
        m.init_runtime().unwrap();
        m.init_thread_pool(2).unwrap();
        let mut g = m.new_game_manager().unwrap();
        b.iter(|| g.init(flop_config()).unwrap())
    });
}

criterion_group!(benches, bench_solve_step);
criterion_main!(benches);
