// SPDX-License-Identifier: Apache-2.0

//! NPN canonicalization for functions of up to 6 variables.
//!
//! NPN equivalence considers input negations (N), input permutations (P)
//! and output negation (N). The canonical representative of a function is
//! the numerically smallest table among all `n! * 2^n * 2` transforms of it.

use serde::{Deserialize, Serialize};

use crate::function::truth_table::TruthTable;
use crate::model::builder::SubnetBuilder;
use crate::model::object::{ObjectStore, SubnetId};

pub const MAX_NPN_VARS: usize = 6;

/// An NPN transform over `perm.len()` variables.
///
/// Transforming `f` into `f'`: for a new assignment `y`, the original
/// assignment `x` satisfies `x[perm[i]] = y[i] ^ input_neg(i)`, and
/// `f'(y) = f(x) ^ output_neg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NpnTransform {
    pub perm: Vec<u8>,
    pub input_neg_mask: u32,
    pub output_neg: bool,
}

impl NpnTransform {
    pub fn identity(num_vars: usize) -> Self {
        Self {
            perm: (0..num_vars as u8).collect(),
            input_neg_mask: 0,
            output_neg: false,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.perm.len()
    }

    pub fn input_negated(&self, i: usize) -> bool {
        (self.input_neg_mask >> i) & 1 != 0
    }

    /// `transform_tt(transform_tt(tt, self), &self.inverse()) == tt`.
    pub fn inverse(&self) -> Self {
        let mut perm = vec![0u8; self.perm.len()];
        let mut input_neg_mask = 0u32;
        for (i, p) in self.perm.iter().enumerate() {
            perm[*p as usize] = i as u8;
            if self.input_negated(i) {
                input_neg_mask |= 1 << p;
            }
        }
        Self {
            perm,
            input_neg_mask,
            output_neg: self.output_neg,
        }
    }
}

/// Applies `xform` to `tt` per the semantics documented on `NpnTransform`.
pub fn transform_tt(tt: &TruthTable, xform: &NpnTransform) -> TruthTable {
    let num_vars = tt.num_vars();
    assert_eq!(
        xform.num_vars(),
        num_vars,
        "transform over {} vars applied to a {}-var table",
        xform.num_vars(),
        num_vars
    );
    let mut out = TruthTable::zero(num_vars);
    for y in 0..tt.num_bits() {
        let mut x = 0usize;
        for (i, p) in xform.perm.iter().enumerate() {
            let bit = ((y >> i) & 1) ^ ((xform.input_neg_mask >> i) & 1) as usize;
            x |= bit << p;
        }
        out.set_bit(y, tt.get_bit(x) ^ xform.output_neg);
    }
    out
}

/// Builds a subnet computing the transform of `subnet_id`'s function:
/// original input `perm[i]` is driven by new input `i`, inverted when
/// `input_neg(i)`, and the output is inverted when `output_neg`.
pub fn apply_to_subnet(store: &mut ObjectStore, subnet_id: SubnetId, xform: &NpnTransform) -> SubnetId {
    let subnet = store.subnet(subnet_id).clone();
    assert_eq!(subnet.out_num(), 1, "NPN transforms apply to single-output subnets");
    assert_eq!(
        subnet.in_num(),
        xform.num_vars(),
        "transform over {} vars applied to a {}-input subnet",
        xform.num_vars(),
        subnet.in_num()
    );
    let mut builder = SubnetBuilder::new();
    let inputs = builder.add_inputs(subnet.in_num());
    let mut bound = inputs.clone();
    for (i, p) in xform.perm.iter().enumerate() {
        bound[*p as usize] = inputs[i].inverted_if(xform.input_negated(i));
    }
    let outputs = builder.add_subnet(&subnet, &bound);
    builder.add_output(outputs[0].inverted_if(xform.output_neg));
    builder.make(store)
}

const VAR_MASKS: [u64; 6] = [
    0xAAAA_AAAA_AAAA_AAAA,
    0xCCCC_CCCC_CCCC_CCCC,
    0xF0F0_F0F0_F0F0_F0F0,
    0xFF00_FF00_FF00_FF00,
    0xFFFF_0000_FFFF_0000,
    0xFFFF_FFFF_0000_0000,
];

fn flip_word(word: u64, var: usize) -> u64 {
    let shift = 1u32 << var;
    ((word & VAR_MASKS[var]) >> shift) | ((word & !VAR_MASKS[var]) << shift)
}

fn permute_word(word: u64, num_vars: usize, perm: &[u8]) -> u64 {
    let mut out = 0u64;
    for y in 0..(1usize << num_vars) {
        let mut x = 0usize;
        for (i, p) in perm.iter().enumerate() {
            x |= ((y >> i) & 1) << p;
        }
        out |= ((word >> x) & 1) << y;
    }
    out
}

/// Rearranges `perm` into the next lexicographic permutation; `false` once
/// the last one has been reached.
pub(crate) fn next_permutation(perm: &mut [u8]) -> bool {
    if perm.len() < 2 {
        return false;
    }
    let mut i = perm.len() - 1;
    while i > 0 && perm[i - 1] >= perm[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = perm.len() - 1;
    while perm[j] <= perm[i - 1] {
        j -= 1;
    }
    perm.swap(i - 1, j);
    perm[i..].reverse();
    true
}

/// Returns the canonical table and the transform taking `tt` to it, or
/// `None` for tables over more than 6 variables.
pub fn canonicalize(tt: &TruthTable) -> Option<(TruthTable, NpnTransform)> {
    let num_vars = tt.num_vars();
    if num_vars > MAX_NPN_VARS {
        return None;
    }
    let full = TruthTable::one(num_vars).as_u64();
    let word = tt.as_u64();

    // (table, output_neg, mask, perm) ordered lexicographically.
    let mut best: Option<(u64, bool, u32, Vec<u8>)> = None;
    let mut consider = |candidate: (u64, bool, u32, &Vec<u8>)| {
        let better = match &best {
            None => true,
            Some((t, o, m, p)) => {
                (candidate.0, candidate.1, candidate.2, candidate.3) < (*t, *o, *m, p)
            }
        };
        if better {
            best = Some((candidate.0, candidate.1, candidate.2, candidate.3.clone()));
        }
    };

    let mut perm: Vec<u8> = (0..num_vars as u8).collect();
    loop {
        let mut t = permute_word(word, num_vars, &perm);
        let mut mask = 0u32;
        for k in 0..(1u32 << num_vars) {
            if k > 0 {
                // Gray code: one input polarity changes per step.
                let var = k.trailing_zeros() as usize;
                t = flip_word(t, var) & full;
                mask ^= 1 << var;
            }
            consider((t, false, mask, &perm));
            consider((!t & full, true, mask, &perm));
        }
        if !next_permutation(&mut perm) {
            break;
        }
    }

    let (canon, output_neg, input_neg_mask, perm) = best?;
    let xform = NpnTransform {
        perm,
        input_neg_mask,
        output_neg,
    };
    let canon = TruthTable::from_u64(num_vars, canon);
    debug_assert_eq!(transform_tt(tt, &xform), canon);
    Some((canon, xform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::eval::evaluate;
    use crate::model::celltype::CellSymbol;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_next_permutation_counts_factorial() {
        let mut perm: Vec<u8> = (0..4).collect();
        let mut count = 1;
        while next_permutation(&mut perm) {
            count += 1;
        }
        assert_eq!(count, 24);
        assert_eq!(perm, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_canonical_forms_of_two_input_gates() {
        let a = TruthTable::var(2, 0);
        let b = TruthTable::var(2, 1);
        let and = a.and(&b);
        let (canon_and, _) = canonicalize(&and).unwrap();
        for f in [a.or(&b), and.not(), a.and_not(&b), b.and_not(&a).not()] {
            assert_eq!(canonicalize(&f).unwrap().0, canon_and);
        }
        let (canon_xor, _) = canonicalize(&a.xor(&b)).unwrap();
        assert_ne!(canon_xor, canon_and);
        assert_eq!(canonicalize(&a.xor(&b).not()).unwrap().0, canon_xor);
    }

    #[test]
    fn test_transform_and_inverse_round_trip() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        for num_vars in 0..=MAX_NPN_VARS {
            for _ in 0..4 {
                let tt = TruthTable::from_u64(num_vars, rng.r#gen::<u64>());
                let (canon, xform) = canonicalize(&tt).unwrap();
                assert_eq!(transform_tt(&tt, &xform), canon);
                assert_eq!(transform_tt(&canon, &xform.inverse()), tt);
                assert_eq!(xform.inverse().inverse(), xform);
            }
        }
    }

    #[test]
    fn test_canonicalize_rejects_wide_tables() {
        assert_eq!(canonicalize(&TruthTable::var(7, 6)), None);
    }

    #[test]
    fn test_apply_to_subnet_matches_transform_tt() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(3);
        let x = builder.add_cell(CellSymbol::And, &[ins[0], !ins[1]]);
        let y = builder.add_cell(CellSymbol::Or, &[x, ins[2]]);
        builder.add_output(y);
        let id = builder.make(&mut store);
        let tt = evaluate(&store, store.subnet(id))[0].clone();

        let xform = NpnTransform {
            perm: vec![2, 0, 1],
            input_neg_mask: 0b101,
            output_neg: true,
        };
        let moved = apply_to_subnet(&mut store, id, &xform);
        assert_eq!(
            evaluate(&store, store.subnet(moved))[0],
            transform_tt(&tt, &xform)
        );
    }
}
