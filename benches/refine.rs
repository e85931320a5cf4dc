//! Benchmarks for refinement and scoring on a synthetic store.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};

use horn_miner::mining::MiningAssistant;
use horn_miner::mining::config::MiningConfig;
use horn_miner::rule::{Position, Rule, TriplePattern, Var};
use horn_miner::store::MemStore;
use horn_miner::symbol::SymbolTable;

const ENTITIES: u32 = 200;
const RELATIONS: u32 = 8;
const FACTS: usize = 2_000;

fn synthetic() -> (SymbolTable, Arc<MemStore>) {
    let symbols = SymbolTable::new();
    let mut store = MemStore::new();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    for _ in 0..FACTS {
        let s = rng.gen_range(0..ENTITIES);
        let r = rng.gen_range(0..RELATIONS);
        let o = rng.gen_range(0..ENTITIES);
        store
            .add_labels(&symbols, &format!("e{s}"), &format!("r{r}"), &format!("e{o}"))
            .unwrap();
    }
    (symbols, Arc::new(store))
}

fn seed(symbols: &SymbolTable) -> Rule {
    let head = TriplePattern::new(Var(0), symbols.lookup("r0").unwrap(), Var(1));
    Rule::seed(head, Position::Subject, 0).unwrap()
}

fn bench_pipeline(c: &mut Criterion) {
    let (symbols, store) = synthetic();
    let assistant = MiningAssistant::new(store, MiningConfig::default(), &symbols).unwrap();
    let rule = seed(&symbols);

    c.bench_function("pipeline_seed_2k_facts", |bench| {
        bench.iter(|| black_box(assistant.run_pipeline(&rule, 2).unwrap()))
    });
}

fn bench_score(c: &mut Criterion) {
    let (symbols, store) = synthetic();
    let assistant = MiningAssistant::new(store, MiningConfig::default(), &symbols).unwrap();
    let rule = seed(&symbols)
        .add_atom(
            TriplePattern::new(Var(0), symbols.lookup("r1").unwrap(), Var(2)),
            0,
        )
        .unwrap()
        .add_atom(
            TriplePattern::new(Var(2), symbols.lookup("r2").unwrap(), Var(1)),
            0,
        )
        .unwrap();

    c.bench_function("score_path_rule_2k_facts", |bench| {
        bench.iter(|| {
            let mut candidate = rule.clone();
            assistant.compute_support(&mut candidate).unwrap();
            assistant.score(&mut candidate).unwrap();
            black_box(candidate.pca_confidence())
        })
    });
}

criterion_group!(benches, bench_pipeline, bench_score);
criterion_main!(benches);
