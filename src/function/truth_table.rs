// SPDX-License-Identifier: Apache-2.0

//! Multi-word truth tables.
//!
//! Bit `i` of the table is the function value on the assignment encoded by
//! `i`, with variable 0 as the least-significant selector bit. Tables of up
//! to 6 variables occupy one word whose unused high bits are kept zero.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Patterns of the six in-word variables.
const VAR_MASKS: [u64; 6] = [
    0xAAAA_AAAA_AAAA_AAAA,
    0xCCCC_CCCC_CCCC_CCCC,
    0xF0F0_F0F0_F0F0_F0F0,
    0xFF00_FF00_FF00_FF00,
    0xFFFF_0000_FFFF_0000,
    0xFFFF_FFFF_0000_0000,
];

pub const MAX_VARS: usize = 24;

pub fn word_count(num_vars: usize) -> usize {
    if num_vars <= 6 {
        1
    } else {
        1 << (num_vars - 6)
    }
}

fn tail_mask(num_vars: usize) -> u64 {
    if num_vars >= 6 {
        u64::MAX
    } else {
        (1u64 << (1u32 << num_vars)) - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TruthTable {
    num_vars: u32,
    words: Vec<u64>,
}

impl TruthTable {
    pub fn zero(num_vars: usize) -> Self {
        assert!(
            num_vars <= MAX_VARS,
            "truth table over {} variables exceeds the limit of {}",
            num_vars,
            MAX_VARS
        );
        Self {
            num_vars: num_vars as u32,
            words: vec![0; word_count(num_vars)],
        }
    }

    pub fn one(num_vars: usize) -> Self {
        Self::zero(num_vars).not()
    }

    pub fn constant(num_vars: usize, value: bool) -> Self {
        if value {
            Self::one(num_vars)
        } else {
            Self::zero(num_vars)
        }
    }

    /// Projection function of variable `var`.
    pub fn var(num_vars: usize, var: usize) -> Self {
        assert!(var < num_vars, "variable {} out of range for {} vars", var, num_vars);
        let mut tt = Self::zero(num_vars);
        if var < 6 {
            tt.words.iter_mut().for_each(|w| *w = VAR_MASKS[var]);
        } else {
            let stride = 1usize << (var - 6);
            for (i, w) in tt.words.iter_mut().enumerate() {
                if (i / stride) % 2 == 1 {
                    *w = u64::MAX;
                }
            }
        }
        tt.mask_tail();
        tt
    }

    /// Takes ownership of raw words, masking bits beyond `2^num_vars`.
    pub fn from_words(num_vars: usize, mut words: Vec<u64>) -> Self {
        let want = word_count(num_vars);
        assert!(
            words.len() >= want,
            "{} words supplied for a {}-variable table",
            words.len(),
            num_vars
        );
        words.truncate(want);
        let mut tt = Self {
            num_vars: num_vars as u32,
            words,
        };
        tt.mask_tail();
        tt
    }

    pub fn from_u64(num_vars: usize, bits: u64) -> Self {
        assert!(num_vars <= 6, "from_u64 needs at most 6 variables");
        Self::from_words(num_vars, vec![bits])
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars as usize
    }

    pub fn num_bits(&self) -> usize {
        1 << self.num_vars
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// The single word of a table with at most 6 variables.
    pub fn as_u64(&self) -> u64 {
        assert!(self.num_vars <= 6, "table over {} vars spans words", self.num_vars);
        self.words[0]
    }

    pub fn get_bit(&self, index: usize) -> bool {
        debug_assert!(index < self.num_bits());
        (self.words[index / 64] >> (index % 64)) & 1 != 0
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.num_bits());
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    fn mask_tail(&mut self) {
        let mask = tail_mask(self.num_vars());
        if let Some(last) = self.words.last_mut() {
            *last &= mask;
        }
    }

    fn zip(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self {
        assert_eq!(
            self.num_vars, other.num_vars,
            "truth tables over different variable counts"
        );
        Self {
            num_vars: self.num_vars,
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| op(*a, *b))
                .collect(),
        }
    }

    pub fn not(&self) -> Self {
        let mut tt = Self {
            num_vars: self.num_vars,
            words: self.words.iter().map(|w| !w).collect(),
        };
        tt.mask_tail();
        tt
    }

    pub fn and(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a & b)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a | b)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a ^ b)
    }

    /// `self & !other`.
    pub fn and_not(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a & !b)
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn is_one(&self) -> bool {
        *self == Self::one(self.num_vars())
    }

    /// `self` implies `other`.
    pub fn implies(&self, other: &Self) -> bool {
        self.and_not(other).is_zero()
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Negative cofactor, still expressed over all variables.
    pub fn cofactor0(&self, var: usize) -> Self {
        self.cofactor(var, false)
    }

    pub fn cofactor1(&self, var: usize) -> Self {
        self.cofactor(var, true)
    }

    fn cofactor(&self, var: usize, value: bool) -> Self {
        assert!(var < self.num_vars(), "variable {} out of range", var);
        let mut tt = self.clone();
        if var < 6 {
            let shift = 1u32 << var;
            let mask = VAR_MASKS[var];
            for w in tt.words.iter_mut() {
                *w = if value {
                    (*w & mask) | ((*w & mask) >> shift)
                } else {
                    (*w & !mask) | ((*w & !mask) << shift)
                };
            }
        } else {
            let stride = 1usize << (var - 6);
            for block in tt.words.chunks_mut(2 * stride) {
                let (lo, hi) = block.split_at_mut(stride);
                if value {
                    lo.copy_from_slice(hi);
                } else {
                    hi.copy_from_slice(lo);
                }
            }
        }
        tt.mask_tail();
        tt
    }

    /// Existential quantification of one variable.
    pub fn exists(&self, var: usize) -> Self {
        self.cofactor0(var).or(&self.cofactor1(var))
    }

    /// Existential quantification of every variable set in `mask`.
    pub fn exists_set(&self, mask: u32) -> Self {
        let mut tt = self.clone();
        for var in 0..self.num_vars() {
            if mask & (1 << var) != 0 {
                tt = tt.exists(var);
            }
        }
        tt
    }

    /// `f(.., !x_var, ..)`.
    pub fn flip_var(&self, var: usize) -> Self {
        assert!(var < self.num_vars(), "variable {} out of range", var);
        let mut tt = self.clone();
        if var < 6 {
            let shift = 1u32 << var;
            let mask = VAR_MASKS[var];
            for w in tt.words.iter_mut() {
                *w = ((*w & mask) >> shift) | ((*w & !mask) << shift);
            }
        } else {
            let stride = 1usize << (var - 6);
            for block in tt.words.chunks_mut(2 * stride) {
                let (lo, hi) = block.split_at_mut(stride);
                lo.swap_with_slice(hi);
            }
        }
        tt.mask_tail();
        tt
    }

    pub fn has_var(&self, var: usize) -> bool {
        self.cofactor0(var) != self.cofactor1(var)
    }

    pub fn support_mask(&self) -> u32 {
        (0..self.num_vars())
            .filter(|v| self.has_var(*v))
            .fold(0, |mask, v| mask | (1 << v))
    }

    pub fn support_size(&self) -> usize {
        self.support_mask().count_ones() as usize
    }

    /// Re-expresses the table over `vars.len()` variables, where new
    /// variable `i` stands for old variable `vars[i]`. Old variables not in
    /// `vars` must not be in the support.
    pub fn project(&self, vars: &[usize]) -> Self {
        debug_assert!({
            let kept: u32 = vars.iter().fold(0, |m, v| m | (1 << v));
            self.support_mask() & !kept == 0
        });
        let mut tt = Self::zero(vars.len());
        for y in 0..tt.num_bits() {
            let x = vars
                .iter()
                .enumerate()
                .filter(|(i, _)| y & (1 << i) != 0)
                .fold(0usize, |x, (_, v)| x | (1 << v));
            tt.set_bit(y, self.get_bit(x));
        }
        tt
    }

    /// Parses a hex string, most-significant digit first. Missing leading
    /// digits are zero.
    pub fn from_hex(num_vars: usize, hex: &str) -> Option<Self> {
        let hex = hex.trim();
        let hex = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))
            .unwrap_or(hex);
        if hex.is_empty() || num_vars > MAX_VARS {
            return None;
        }
        let mut tt = Self::zero(num_vars);
        let capacity_bits = tt.num_bits().max(4);
        for (pos, c) in hex.chars().rev().enumerate() {
            let digit = c.to_digit(16)? as u64;
            if digit == 0 {
                continue;
            }
            let bit = pos * 4;
            if bit >= capacity_bits {
                return None;
            }
            if num_vars < 2 && (digit << bit) >> tt.num_bits() != 0 {
                return None;
            }
            tt.words[bit / 64] |= digit << (bit % 64);
        }
        Some(tt)
    }

    pub fn to_hex(&self) -> String {
        let digits = (self.num_bits() / 4).max(1);
        (0..digits)
            .rev()
            .map(|d| {
                let bit = d * 4;
                let nibble = (self.words[bit / 64] >> (bit % 64)) & 0xF;
                std::char::from_digit(nibble as u32, 16).unwrap_or('0')
            })
            .collect()
    }
}

/// Numeric order: fewer variables first, then by value with the
/// most-significant word compared first.
impl Ord for TruthTable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.num_vars
            .cmp(&other.num_vars)
            .then_with(|| self.words.iter().rev().cmp(other.words.iter().rev()))
    }
}

impl PartialOrd for TruthTable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for TruthTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_small_vars_match_masks() {
        assert_eq!(TruthTable::var(2, 0).as_u64(), 0b1010);
        assert_eq!(TruthTable::var(2, 1).as_u64(), 0b1100);
        assert_eq!(TruthTable::one(3).as_u64(), 0xFF);
        assert_eq!(TruthTable::var(1, 0).not().as_u64(), 0b01);
    }

    #[test]
    fn test_wide_var_layout() {
        let v7 = TruthTable::var(8, 7);
        assert_eq!(v7.words(), &[0, 0, u64::MAX, u64::MAX]);
        let v6 = TruthTable::var(8, 6);
        assert_eq!(v6.words(), &[0, u64::MAX, 0, u64::MAX]);
    }

    #[test_case(3, 1; "in word")]
    #[test_case(8, 6; "across words")]
    #[test_case(8, 7; "top variable")]
    fn test_cofactors_drop_variable(num_vars: usize, var: usize) {
        let x = TruthTable::var(num_vars, var);
        let y = TruthTable::var(num_vars, 0);
        let f = x.and(&y).or(&x.not().and(&y.not()));
        assert_eq!(f.cofactor1(var), y);
        assert_eq!(f.cofactor0(var), y.not());
        assert!(!f.cofactor1(var).has_var(var));
        assert_eq!(f.flip_var(var), f.not());
    }

    #[test]
    fn test_support_and_project() {
        let a = TruthTable::var(4, 1);
        let b = TruthTable::var(4, 3);
        let f = a.xor(&b);
        assert_eq!(f.support_mask(), 0b1010);
        let g = f.project(&[1, 3]);
        assert_eq!(g, TruthTable::var(2, 0).xor(&TruthTable::var(2, 1)));
    }

    #[test]
    fn test_hex_round_trip() {
        let nand = TruthTable::from_hex(2, "7").unwrap();
        assert_eq!(nand, TruthTable::var(2, 0).and(&TruthTable::var(2, 1)).not());
        assert_eq!(nand.to_hex(), "7");
        let inv = TruthTable::from_hex(1, "1").unwrap();
        assert_eq!(inv, TruthTable::var(1, 0).not());
        let maj = TruthTable::from_hex(3, "0xe8").unwrap();
        assert_eq!(maj.to_hex(), "e8");
        let wide = TruthTable::var(7, 6);
        assert_eq!(TruthTable::from_hex(7, &wide.to_hex()).unwrap(), wide);
        assert_eq!(TruthTable::from_hex(1, "4"), None);
        assert_eq!(TruthTable::from_hex(2, "1f"), None);
        assert_eq!(TruthTable::from_hex(2, "g"), None);
    }

    #[test]
    fn test_order_is_numeric() {
        let lo = TruthTable::from_words(7, vec![u64::MAX, 0]);
        let hi = TruthTable::from_words(7, vec![0, 1]);
        assert!(lo < hi);
    }
}
