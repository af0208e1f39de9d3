// SPDX-License-Identifier: Apache-2.0

use crate::function::isop::isop;
use crate::function::truth_table::TruthTable;
use crate::model::builder::{SubnetBuilder, SubnetBuilderOptions};
use crate::model::object::{ObjectStore, SubnetId};
use crate::synthesis::{Resynthesizer, build_sop, split_care};

/// Two-level synthesis from an irredundant sum-of-products.
///
/// Both the function and its complement are covered; the cover with fewer
/// literals is built, with an inverted output for the complement.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinatoMorreale;

impl Resynthesizer for MinatoMorreale {
    fn resynthesize(
        &self,
        store: &mut ObjectStore,
        func: &TruthTable,
        care: Option<&TruthTable>,
        max_arity: u16,
    ) -> Option<SubnetId> {
        let num_vars = func.num_vars();
        let (on, off) = split_care(func, care);
        let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::opt());
        let inputs = builder.add_inputs(num_vars);

        let output = if on.is_zero() {
            builder.add_const(false)
        } else if off.is_zero() {
            builder.add_const(true)
        } else {
            let (pos, _) = isop(&on, &off.not());
            let (neg, _) = isop(&off, &on.not());
            let literals = |cubes: &[crate::function::isop::Cube]| -> usize {
                cubes.iter().map(|c| c.num_literals().max(1)).sum()
            };
            if literals(&neg) < literals(&pos) {
                !build_sop(&mut builder, &inputs, &neg, max_arity)
            } else {
                build_sop(&mut builder, &inputs, &pos, max_arity)
            }
        };
        builder.add_output(output);
        Some(builder.make(store))
    }

    fn name(&self) -> &'static str {
        "isop"
    }
}
