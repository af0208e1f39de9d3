// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use subnet_synth::function::evaluate;
use subnet_synth::model::celltype::CellSymbol;
use subnet_synth::model::{ObjectStore, SubnetBuilder, SubnetBuilderOptions, SubnetId};
use subnet_synth::npn::NpnDatabase;
use subnet_synth::optimizer::{RewriteOptions, Rewriter};
use subnet_synth::synthesis::{BiDecomposition, MinatoMorreale, NpnResynthesizer, Resynthesizer};

fn random_subnet(store: &mut ObjectStore, inputs: usize, cells: usize, seed: u64) -> SubnetId {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::no_opt());
    let mut signals = builder.add_inputs(inputs);
    for _ in 0..cells {
        let a = signals[rng.gen_range(0..signals.len())].inverted_if(rng.gen_bool(0.3));
        let b = signals[rng.gen_range(0..signals.len())].inverted_if(rng.gen_bool(0.3));
        let symbol = match rng.gen_range(0..4) {
            0 => CellSymbol::And,
            1 => CellSymbol::Or,
            2 => CellSymbol::Xor,
            _ => CellSymbol::Maj,
        };
        let link = if symbol == CellSymbol::Maj {
            let c = signals[rng.gen_range(0..signals.len())];
            builder.add_cell(symbol, &[a, b, c])
        } else {
            builder.add_cell(symbol, &[a, b])
        };
        signals.push(link);
    }
    for link in &signals[signals.len() - 3..] {
        builder.add_output(*link);
    }
    builder.make(store)
}

fn check_rewrite(resynthesizer: &dyn Resynthesizer, store: &mut ObjectStore, cut_size: usize) {
    for seed in 0..6 {
        let id = random_subnet(store, 6, 40, seed);
        let before = evaluate(store, store.subnet(id));
        let mut builder = SubnetBuilder::from_subnet(store.subnet(id));
        let options = RewriteOptions {
            cut_size,
            validate: true,
            ..RewriteOptions::default()
        };
        let stats = Rewriter::new(resynthesizer, options)
            .rewrite(store, &mut builder)
            .unwrap();
        let rewritten = builder.make(store);
        assert_eq!(
            evaluate(store, store.subnet(rewritten)),
            before,
            "{} seed {}",
            resynthesizer.name(),
            seed
        );
        assert!(stats.cells_after <= stats.cells_before, "{:?}", stats);
        store.subnet(rewritten).check_invariants().unwrap();
    }
}

#[test]
fn test_isop_rewrite_preserves_function() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut store = ObjectStore::new();
    check_rewrite(&MinatoMorreale, &mut store, 4);
}

#[test]
fn test_bidecomp_rewrite_preserves_function() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut store = ObjectStore::new();
    check_rewrite(&BiDecomposition, &mut store, 5);
}

#[test]
fn test_npn_rewrite_preserves_function() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut store = ObjectStore::new();
    let mut db = NpnDatabase::new();
    db.populate(&mut store, 3, &[&MinatoMorreale, &BiDecomposition]);

    // Round-trip the database through its on-disk form first.
    let mut bytes = Vec::new();
    db.dump(&store, &mut bytes).unwrap();
    let restored = NpnDatabase::restore(&mut store, bytes.as_slice()).unwrap();
    assert_eq!(restored.len(), db.len());

    let resynthesizer = NpnResynthesizer::new(restored);
    check_rewrite(&resynthesizer, &mut store, 3);
}
