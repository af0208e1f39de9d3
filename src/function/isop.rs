// SPDX-License-Identifier: Apache-2.0

//! Minato-Morreale irredundant sum-of-products.

use crate::function::truth_table::TruthTable;

/// Product term. Variable `v` appears iff bit `v` of `mask` is set, as a
/// positive literal iff bit `v` of `polarity` is also set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cube {
    pub mask: u32,
    pub polarity: u32,
}

impl Cube {
    pub fn num_literals(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// `(var, positive)` pairs in ascending variable order.
    pub fn literals(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        (0..32usize)
            .filter(move |v| self.mask & (1 << v) != 0)
            .map(move |v| (v, self.polarity & (1 << v) != 0))
    }

    fn with_literal(self, var: usize, positive: bool) -> Self {
        let bit = 1u32 << var;
        Self {
            mask: self.mask | bit,
            polarity: if positive {
                self.polarity | bit
            } else {
                self.polarity & !bit
            },
        }
    }

    pub fn to_truth_table(&self, num_vars: usize) -> TruthTable {
        self.literals()
            .fold(TruthTable::one(num_vars), |acc, (var, positive)| {
                let lit = TruthTable::var(num_vars, var);
                acc.and(&if positive { lit } else { lit.not() })
            })
    }
}

/// Computes a cover `F` with `lower <= F <= upper`. Returns the cubes and
/// the function they realize.
pub fn isop(lower: &TruthTable, upper: &TruthTable) -> (Vec<Cube>, TruthTable) {
    assert!(
        lower.implies(upper),
        "isop interval is empty: lower bound is not contained in upper bound"
    );
    let mut cubes = Vec::new();
    let cover = isop_rec(lower, upper, lower.num_vars(), &mut cubes);
    debug_assert!(lower.implies(&cover) && cover.implies(upper));
    (cubes, cover)
}

fn isop_rec(
    lower: &TruthTable,
    upper: &TruthTable,
    top: usize,
    cubes: &mut Vec<Cube>,
) -> TruthTable {
    let num_vars = lower.num_vars();
    if lower.is_zero() {
        return TruthTable::zero(num_vars);
    }
    if upper.is_one() {
        cubes.push(Cube::default());
        return TruthTable::one(num_vars);
    }
    let var = (0..top)
        .rev()
        .find(|v| lower.has_var(*v) || upper.has_var(*v))
        .unwrap_or_else(|| panic!("isop: non-constant bounds with no support below {}", top));

    let l0 = lower.cofactor0(var);
    let l1 = lower.cofactor1(var);
    let u0 = upper.cofactor0(var);
    let u1 = upper.cofactor1(var);

    let start0 = cubes.len();
    let r0 = isop_rec(&l0.and_not(&u1), &u0, var, cubes);
    for cube in &mut cubes[start0..] {
        *cube = cube.with_literal(var, false);
    }

    let start1 = cubes.len();
    let r1 = isop_rec(&l1.and_not(&u0), &u1, var, cubes);
    for cube in &mut cubes[start1..] {
        *cube = cube.with_literal(var, true);
    }

    let rest_lower = l0.and_not(&r0).or(&l1.and_not(&r1));
    let rest_upper = u0.and(&u1);
    let rest = isop_rec(&rest_lower, &rest_upper, var, cubes);

    let x = TruthTable::var(num_vars, var);
    r0.and_not(&x).or(&r1.and(&x)).or(&rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn cover_of(cubes: &[Cube], num_vars: usize) -> TruthTable {
        cubes.iter().fold(TruthTable::zero(num_vars), |acc, c| {
            acc.or(&c.to_truth_table(num_vars))
        })
    }

    #[test]
    fn test_isop_of_constants() {
        let (cubes, cover) = isop(&TruthTable::zero(3), &TruthTable::zero(3));
        assert!(cubes.is_empty());
        assert!(cover.is_zero());
        let (cubes, cover) = isop(&TruthTable::one(3), &TruthTable::one(3));
        assert_eq!(cubes, vec![Cube::default()]);
        assert!(cover.is_one());
    }

    #[test]
    fn test_isop_of_xor_has_two_cubes() {
        let f = TruthTable::var(2, 0).xor(&TruthTable::var(2, 1));
        let (cubes, cover) = isop(&f, &f);
        assert_eq!(cover, f);
        assert_eq!(cubes.len(), 2);
        assert!(cubes.iter().all(|c| c.num_literals() == 2));
    }

    #[test]
    fn test_isop_uses_dont_cares() {
        // on = a & b, dc = a & !b: the cover collapses to the literal a.
        let a = TruthTable::var(2, 0);
        let b = TruthTable::var(2, 1);
        let (cubes, cover) = isop(&a.and(&b), &a);
        assert_eq!(cover, a);
        assert_eq!(
            cubes,
            vec![Cube {
                mask: 0b01,
                polarity: 0b01
            }]
        );
    }

    #[test]
    fn test_isop_random_functions_are_exact() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        for num_vars in 1..=8 {
            for _ in 0..8 {
                let words = (0..crate::function::truth_table::word_count(num_vars))
                    .map(|_| rng.r#gen::<u64>())
                    .collect();
                let f = TruthTable::from_words(num_vars, words);
                let (cubes, cover) = isop(&f, &f);
                assert_eq!(cover, f);
                assert_eq!(cover_of(&cubes, num_vars), f);
            }
        }
    }
}
