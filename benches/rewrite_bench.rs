// SPDX-License-Identifier: Apache-2.0

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use subnet_synth::cut::CutExtractor;
use subnet_synth::model::celltype::CellSymbol;
use subnet_synth::model::{ObjectStore, SubnetBuilder, SubnetBuilderOptions, SubnetId};
use subnet_synth::optimizer::{RewriteOptions, Rewriter};
use subnet_synth::synthesis::MinatoMorreale;

/// A random network of two-input gates over 16 inputs.
fn random_subnet(store: &mut ObjectStore, cells: usize, seed: u64) -> SubnetId {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::no_opt());
    let mut signals = builder.add_inputs(16);
    for _ in 0..cells {
        let a = signals[rng.gen_range(0..signals.len())].inverted_if(rng.gen_bool(0.3));
        let b = signals[rng.gen_range(0..signals.len())].inverted_if(rng.gen_bool(0.3));
        let symbol = match rng.gen_range(0..3) {
            0 => CellSymbol::And,
            1 => CellSymbol::Or,
            _ => CellSymbol::Xor,
        };
        signals.push(builder.add_cell(symbol, &[a, b]));
    }
    for link in &signals[signals.len() - 8..] {
        builder.add_output(*link);
    }
    builder.make(store)
}

fn rewrite_benchmark(c: &mut Criterion) {
    let mut store = ObjectStore::new();
    let id = random_subnet(&mut store, 400, 1);

    c.bench_function("cut_extract_k4", |b| {
        b.iter(|| {
            let extractor = CutExtractor::new(store.subnet(id), 4);
            black_box(extractor.get_cuts(100).len());
        })
    });

    c.bench_function("rewrite_isop_k4", |b| {
        b.iter_batched(
            || {
                let mut store = ObjectStore::new();
                let id = random_subnet(&mut store, 400, 1);
                let builder = SubnetBuilder::from_subnet(store.subnet(id));
                (store, builder)
            },
            |(mut store, mut builder)| {
                let options = RewriteOptions {
                    validate: false,
                    ..RewriteOptions::default()
                };
                let stats = Rewriter::new(&MinatoMorreale, options)
                    .rewrite(&mut store, &mut builder)
                    .unwrap();
                black_box(stats);
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, rewrite_benchmark);
criterion_main!(benches);
