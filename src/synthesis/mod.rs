// SPDX-License-Identifier: Apache-2.0

//! Resynthesis of a Boolean function into a fresh single-output subnet.

pub mod arith;
pub mod bidecomp;
pub mod isop;
pub mod npn_resynth;

use crate::function::isop::Cube;
use crate::function::truth_table::TruthTable;
use crate::model::builder::SubnetBuilder;
use crate::model::celltype::CellSymbol;
use crate::model::object::{ObjectStore, SubnetId};
use crate::model::subnet::Link;

pub use arith::{ArithOp, synthesize_arith};
pub use bidecomp::BiDecomposition;
pub use isop::MinatoMorreale;
pub use npn_resynth::NpnResynthesizer;

pub trait Resynthesizer {
    /// Builds a subnet with `func.num_vars()` inputs and one output that
    /// agrees with `func` wherever `care` is set (everywhere when `care` is
    /// `None`). `None` when the function is out of reach for this method.
    fn resynthesize(
        &self,
        store: &mut ObjectStore,
        func: &TruthTable,
        care: Option<&TruthTable>,
        max_arity: u16,
    ) -> Option<SubnetId>;

    fn name(&self) -> &'static str;
}

/// On-set and off-set of `func` restricted to `care`.
pub(crate) fn split_care(func: &TruthTable, care: Option<&TruthTable>) -> (TruthTable, TruthTable) {
    match care {
        Some(care) => (func.and(care), care.and_not(func)),
        None => (func.clone(), func.not()),
    }
}

/// Balanced AND trees of the cube literals joined by a balanced OR tree.
pub(crate) fn build_sop(
    builder: &mut SubnetBuilder,
    inputs: &[Link],
    cubes: &[Cube],
    max_arity: u16,
) -> Link {
    let terms: Vec<Link> = cubes
        .iter()
        .map(|cube| {
            let literals: Vec<Link> = cube
                .literals()
                .map(|(var, positive)| inputs[var].inverted_if(!positive))
                .collect();
            builder.add_cell_tree(CellSymbol::And, &literals, max_arity)
        })
        .collect();
    builder.add_cell_tree(CellSymbol::Or, &terms, max_arity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::eval::evaluate;
    use crate::model::builder::SubnetBuilderOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_sop_of_empty_cover_is_zero() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::opt());
        let inputs = builder.add_inputs(2);
        let out = build_sop(&mut builder, &inputs, &[], 2);
        builder.add_output(out);
        let id = builder.make(&mut store);
        assert!(evaluate(&store, store.subnet(id))[0].is_zero());
    }

    #[test]
    fn test_split_care_partitions_care_set() {
        let f = TruthTable::var(2, 0);
        let care = TruthTable::var(2, 1);
        let (on, off) = split_care(&f, Some(&care));
        assert_eq!(on.or(&off), care);
        assert!(on.and(&off).is_zero());
    }
}
