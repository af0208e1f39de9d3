// SPDX-License-Identifier: Apache-2.0

//! Bi-decomposition of incompletely specified functions.
//!
//! The function is carried as an on-set/off-set pair. A decomposition
//! `f = g OP h` splits the support into variables seen only by `g` (XA),
//! only by `h` (XB), and shared ones. The components get their own
//! on/off-sets, derived so that any realization within them composes back
//! into a realization of `f`.

use crate::function::isop::isop;
use crate::function::truth_table::TruthTable;
use crate::model::builder::{SubnetBuilder, SubnetBuilderOptions};
use crate::model::celltype::CellSymbol;
use crate::model::object::{ObjectStore, SubnetId};
use crate::model::subnet::Link;
use crate::synthesis::{Resynthesizer, build_sop, split_care};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Or,
    And,
    Xor,
}

#[derive(Debug, Clone, Copy)]
struct Partition {
    gate: Gate,
    xa: u32,
    xb: u32,
}

impl Partition {
    fn score(&self) -> u32 {
        self.xa.count_ones() + self.xb.count_ones()
    }
}

/// Substitutes 0 for every variable in `mask`.
fn cofactor0_set(tt: &TruthTable, mask: u32) -> TruthTable {
    let mut result = tt.clone();
    for var in 0..tt.num_vars() {
        if mask & (1 << var) != 0 {
            result = result.cofactor0(var);
        }
    }
    result
}

/// `on = g | h` is separable with `g` blind to XB and `h` blind to XA.
fn or_separable(on: &TruthTable, off: &TruthTable, xa: u32, xb: u32) -> bool {
    on.and(&off.exists_set(xb))
        .and(&off.exists_set(xa))
        .is_zero()
}

fn xor_separable(f: &TruthTable, xa: u32, xb: u32) -> bool {
    let (g, h) = xor_components(f, xa, xb);
    g.xor(&h) == *f
}

fn xor_components(f: &TruthTable, xa: u32, xb: u32) -> (TruthTable, TruthTable) {
    let g = cofactor0_set(f, xb);
    let f_a0 = cofactor0_set(f, xa);
    let h = f_a0.xor(&cofactor0_set(&f_a0, xb));
    (g, h)
}

fn separable(gate: Gate, on: &TruthTable, off: &TruthTable, xa: u32, xb: u32) -> bool {
    match gate {
        Gate::Or => or_separable(on, off, xa, xb),
        Gate::And => or_separable(off, on, xa, xb),
        Gate::Xor => xor_separable(on, xa, xb),
    }
}

/// Grows a partition from every seed pair and keeps the widest one.
fn find_partition(gate: Gate, on: &TruthTable, off: &TruthTable, support: u32) -> Option<Partition> {
    let vars: Vec<u32> = (0..32).filter(|v| support & (1 << v) != 0).collect();
    let mut best: Option<Partition> = None;
    for (i, a) in vars.iter().enumerate() {
        for b in &vars[i + 1..] {
            let (mut xa, mut xb) = (1u32 << a, 1u32 << b);
            if !separable(gate, on, off, xa, xb) {
                continue;
            }
            for v in &vars {
                let bit = 1u32 << v;
                if (xa | xb) & bit != 0 {
                    continue;
                }
                if separable(gate, on, off, xa | bit, xb) {
                    xa |= bit;
                } else if separable(gate, on, off, xa, xb | bit) {
                    xb |= bit;
                }
            }
            let candidate = Partition { gate, xa, xb };
            if best.map_or(true, |p| candidate.score() > p.score()) {
                best = Some(candidate);
            }
        }
    }
    best
}

struct Decomposer {
    builder: SubnetBuilder,
    inputs: Vec<Link>,
    max_arity: u16,
}

impl Decomposer {
    fn isop_fallback(&mut self, on: &TruthTable, off: &TruthTable) -> (Link, TruthTable) {
        let (cubes, cover) = isop(on, &off.not());
        let link = build_sop(&mut self.builder, &self.inputs, &cubes, self.max_arity);
        (link, cover)
    }

    /// Returns the link realizing some function between `on` and `!off`,
    /// together with that function.
    fn decompose(&mut self, on: &TruthTable, off: &TruthTable) -> (Link, TruthTable) {
        let num_vars = on.num_vars();
        if on.is_zero() {
            return (self.builder.add_const(false), TruthTable::zero(num_vars));
        }
        if off.is_zero() {
            return (self.builder.add_const(true), TruthTable::one(num_vars));
        }
        let support = on.support_mask() | off.support_mask();
        if support.count_ones() <= 1 {
            return self.isop_fallback(on, off);
        }

        let fully_specified = on.or(off).is_one();
        let mut best: Option<Partition> = None;
        for gate in [Gate::Or, Gate::And, Gate::Xor] {
            if gate == Gate::Xor && !fully_specified {
                continue;
            }
            if let Some(p) = find_partition(gate, on, off, support) {
                if best.map_or(true, |b| p.score() > b.score()) {
                    best = Some(p);
                }
            }
        }
        let Some(partition) = best else {
            return self.isop_fallback(on, off);
        };
        log::trace!(
            "bidecomp: gate={:?} xa={:#b} xb={:#b} support={:#b}",
            partition.gate,
            partition.xa,
            partition.xb,
            support
        );

        match partition.gate {
            Gate::Or => {
                let ((g, g_real), (h, h_real)) =
                    self.or_components(on, off, partition.xa, partition.xb);
                let link = self.builder.add_cell(CellSymbol::Or, &[g, h]);
                (link, g_real.or(&h_real))
            }
            Gate::And => {
                // f = g & h  <=>  !f = !g | !h.
                let ((g, g_real), (h, h_real)) =
                    self.or_components(off, on, partition.xa, partition.xb);
                let link = self.builder.add_cell(CellSymbol::And, &[!g, !h]);
                (link, g_real.or(&h_real).not())
            }
            Gate::Xor => {
                let (g, h) = xor_components(on, partition.xa, partition.xb);
                let (g_link, g_real) = self.decompose(&g, &g.not());
                let (h_link, h_real) = self.decompose(&h, &h.not());
                let link = self.builder.add_cell(CellSymbol::Xor, &[g_link, h_link]);
                (link, g_real.xor(&h_real))
            }
        }
    }

    /// Realizes `g` and `h` with `g | h` between `on` and `!off`.
    fn or_components(
        &mut self,
        on: &TruthTable,
        off: &TruthTable,
        xa: u32,
        xb: u32,
    ) -> ((Link, TruthTable), (Link, TruthTable)) {
        let off_a = off.exists_set(xa);
        let g_on = on.and(&off_a).exists_set(xb);
        let g_off = off.exists_set(xb);
        let (g_link, g_real) = self.decompose(&g_on, &g_off);

        let h_on = on.and_not(&g_real).exists_set(xa);
        let h_off = off_a;
        let (h_link, h_real) = self.decompose(&h_on, &h_off);
        ((g_link, g_real), (h_link, h_real))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BiDecomposition;

impl Resynthesizer for BiDecomposition {
    fn resynthesize(
        &self,
        store: &mut ObjectStore,
        func: &TruthTable,
        care: Option<&TruthTable>,
        max_arity: u16,
    ) -> Option<SubnetId> {
        let (on, off) = split_care(func, care);
        let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::opt());
        let inputs = builder.add_inputs(func.num_vars());
        let mut decomposer = Decomposer {
            builder,
            inputs,
            max_arity,
        };
        let (output, realized) = decomposer.decompose(&on, &off);
        debug_assert!(on.implies(&realized) && off.and(&realized).is_zero());
        decomposer.builder.add_output(output);
        Some(decomposer.builder.make(store))
    }

    fn name(&self) -> &'static str {
        "bidecomp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::eval::evaluate;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn synth(store: &mut ObjectStore, f: &TruthTable) -> SubnetId {
        BiDecomposition.resynthesize(store, f, None, 2).unwrap()
    }

    #[test]
    fn test_or_of_disjoint_ands_is_found() {
        let mut store = ObjectStore::new();
        let v = |i| TruthTable::var(4, i);
        let f = v(0).and(&v(1)).or(&v(2).and(&v(3)));
        assert!(or_separable(&f, &f.not(), 0b0011, 0b1100));
        let id = synth(&mut store, &f);
        assert_eq!(evaluate(&store, store.subnet(id))[0], f);
        assert_eq!(store.subnet(id).cell_count(), 3);
    }

    #[test]
    fn test_xor_chain_is_found() {
        let mut store = ObjectStore::new();
        let v = |i| TruthTable::var(5, i);
        let f = (0..5).fold(TruthTable::zero(5), |acc, i| acc.xor(&v(i)));
        let id = synth(&mut store, &f);
        assert_eq!(evaluate(&store, store.subnet(id))[0], f);
        assert_eq!(store.subnet(id).cell_count(), 4);
    }

    #[test]
    fn test_and_is_dual_of_or() {
        let mut store = ObjectStore::new();
        let v = |i| TruthTable::var(4, i);
        let f = v(0).or(&v(1)).and(&v(2).or(&v(3)));
        let id = synth(&mut store, &f);
        assert_eq!(evaluate(&store, store.subnet(id))[0], f);
        assert_eq!(store.subnet(id).cell_count(), 3);
    }

    #[test]
    fn test_random_functions_with_dont_cares() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut store = ObjectStore::new();
        for num_vars in 1..=7 {
            for _ in 0..6 {
                let words: Vec<u64> = (0..crate::function::truth_table::word_count(num_vars))
                    .map(|_| rng.r#gen::<u64>())
                    .collect();
                let care_words: Vec<u64> = words.iter().map(|_| rng.r#gen::<u64>() | rng.r#gen::<u64>()).collect();
                let f = TruthTable::from_words(num_vars, words);
                let care = TruthTable::from_words(num_vars, care_words);
                let id = BiDecomposition
                    .resynthesize(&mut store, &f, Some(&care), 2)
                    .unwrap();
                let realized = evaluate(&store, store.subnet(id)).swap_remove(0);
                assert_eq!(realized.and(&care), f.and(&care));
            }
        }
    }
}
