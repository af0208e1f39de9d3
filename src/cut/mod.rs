// SPDX-License-Identifier: Apache-2.0

pub mod cone;
pub mod extractor;
pub mod reconvergence;

pub use cone::{Cone, cone};
pub use extractor::{CutExtractor, CutOptions};
pub use reconvergence::{reconvergence_cut, reconvergence_leaves};

/// A root entry and a sorted, deduplicated set of leaves separating it from
/// the inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cut {
    pub root: u32,
    pub leaves: Vec<u32>,
    /// One bit per `leaf % 64`; a subset's signature is covered by its
    /// superset's.
    pub signature: u64,
}

fn signature_of(leaves: &[u32]) -> u64 {
    leaves.iter().fold(0, |sig, leaf| sig | (1u64 << (leaf % 64)))
}

impl Cut {
    pub fn new(root: u32, mut leaves: Vec<u32>) -> Self {
        leaves.sort_unstable();
        leaves.dedup();
        let signature = signature_of(&leaves);
        Self {
            root,
            leaves,
            signature,
        }
    }

    pub fn trivial(root: u32) -> Self {
        Self::new(root, vec![root])
    }

    pub fn is_trivial(&self) -> bool {
        self.leaves.len() == 1 && self.leaves[0] == self.root
    }

    pub fn size(&self) -> usize {
        self.leaves.len()
    }

    /// Whether every leaf of `self` is a leaf of `other`.
    pub fn is_subset_of(&self, other: &Cut) -> bool {
        if self.signature & !other.signature != 0 || self.leaves.len() > other.leaves.len() {
            return false;
        }
        self.leaves
            .iter()
            .all(|leaf| other.leaves.binary_search(leaf).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_and_dedups() {
        let cut = Cut::new(9, vec![4, 1, 4, 7]);
        assert_eq!(cut.leaves, vec![1, 4, 7]);
        assert_eq!(cut.signature, (1 << 1) | (1 << 4) | (1 << 7));
    }

    #[test]
    fn test_subset_uses_signature_and_leaves() {
        let small = Cut::new(9, vec![1, 65]);
        let big = Cut::new(9, vec![1, 2, 65]);
        let alias = Cut::new(9, vec![1, 2, 129]);
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        // 65 and 129 share a signature bit but are different leaves.
        assert!(!small.is_subset_of(&alias));
    }
}
