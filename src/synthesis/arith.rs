// SPDX-License-Identifier: Apache-2.0

//! Word-level arithmetic generators.

use crate::model::builder::{SubnetBuilder, SubnetBuilderOptions};
use crate::model::celltype::CellSymbol;
use crate::model::object::{ObjectStore, SubnetId};
use crate::model::subnet::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Ripple-carry sum of `a` and `b` with carry-in `carry`; returns the sum
/// bits followed by the carry-out.
fn ripple(builder: &mut SubnetBuilder, a: &[Link], b: &[Link], carry: Option<Link>) -> Vec<Link> {
    let mut carry = carry;
    let mut outputs = Vec::with_capacity(a.len() + 1);
    for (x, y) in a.iter().zip(b) {
        let (sum, carry_out) = match carry {
            None => (
                builder.add_cell(CellSymbol::Xor, &[*x, *y]),
                builder.add_cell(CellSymbol::And, &[*x, *y]),
            ),
            Some(c) => (
                builder.add_cell(CellSymbol::Xor, &[*x, *y, c]),
                builder.add_cell(CellSymbol::Maj, &[*x, *y, c]),
            ),
        };
        outputs.push(sum);
        carry = Some(carry_out);
    }
    outputs.push(carry.unwrap_or_else(|| builder.add_const(false)));
    outputs
}

/// Builds a `width`-bit operator over inputs `a[0..width]` then
/// `b[0..width]`, least significant bit first.
///
/// `Add` outputs the sum and the carry-out. `Sub` outputs `a - b` modulo
/// `2^width` and the carry-out of `a + !b + 1`, which is set when `a >= b`.
/// The other operators are not supported.
pub fn synthesize_arith(store: &mut ObjectStore, op: ArithOp, width: usize) -> Option<SubnetId> {
    assert!(width > 0, "arithmetic operands need at least one bit");
    let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::opt());
    let a = builder.add_inputs(width);
    let b = builder.add_inputs(width);
    let outputs = match op {
        ArithOp::Add => ripple(&mut builder, &a, &b, None),
        ArithOp::Sub => {
            let not_b: Vec<Link> = b.iter().map(|l| !*l).collect();
            let one = builder.add_const(true);
            ripple(&mut builder, &a, &not_b, Some(one))
        }
        ArithOp::Mul | ArithOp::Div | ArithOp::Rem => {
            log::debug!("arith: {:?} is not supported", op);
            return None;
        }
    };
    for link in outputs {
        builder.add_output(link);
    }
    Some(builder.make(store))
}
