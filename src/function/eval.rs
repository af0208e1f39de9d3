// SPDX-License-Identifier: Apache-2.0

//! Bit-parallel evaluation of subnets and cut cones.

use ahash::AHashMap;

use crate::cut::Cut;
use crate::function::truth_table::{TruthTable, word_count};
use crate::model::celltype::CellSymbol;
use crate::model::object::ObjectStore;
use crate::model::subnet::{Cell, CellGraph, Link, Subnet};

/// Upper bound on the variables of a cone or subnet evaluated exhaustively.
pub const MAX_EVAL_VARS: usize = 16;

/// Per-port simulation words of one entry.
pub type PortValues = Vec<Vec<u64>>;

fn link_words(values: &PortValues, link: Link) -> Vec<u64> {
    let words = &values[link.out as usize];
    if link.inv {
        words.iter().map(|w| !w).collect()
    } else {
        words.clone()
    }
}

fn fold_words(inputs: &[Vec<u64>], words: usize, init: u64, op: impl Fn(u64, u64) -> u64) -> Vec<u64> {
    let mut acc = vec![init; words];
    for input in inputs {
        for (a, w) in acc.iter_mut().zip(input) {
            *a = op(*a, *w);
        }
    }
    acc
}

fn majority_words(inputs: &[Vec<u64>], words: usize) -> Vec<u64> {
    let threshold = inputs.len() / 2;
    (0..words)
        .map(|w| {
            (0..64).fold(0u64, |acc, bit| {
                let ones = inputs
                    .iter()
                    .filter(|input| (input[w] >> bit) & 1 != 0)
                    .count();
                if ones > threshold { acc | (1 << bit) } else { acc }
            })
        })
        .collect()
}

/// Evaluates one cell given the simulation words of its inputs (polarity
/// already applied). Returns one word vector per output port.
pub fn eval_cell(store: &ObjectStore, cell: &Cell, inputs: &[Vec<u64>], words: usize) -> PortValues {
    let (symbol, inv) = cell.symbol.positive();
    let value = match symbol {
        CellSymbol::Zero => vec![0; words],
        CellSymbol::One => vec![u64::MAX; words],
        CellSymbol::Buf | CellSymbol::Out => inputs[0].clone(),
        CellSymbol::And => fold_words(inputs, words, u64::MAX, |a, b| a & b),
        CellSymbol::Or => fold_words(inputs, words, 0, |a, b| a | b),
        CellSymbol::Xor => fold_words(inputs, words, 0, |a, b| a ^ b),
        CellSymbol::Maj => majority_words(inputs, words),
        CellSymbol::Cell => {
            let cell_type = store.cell_type(cell.type_id);
            let impl_id = cell_type.impl_subnet.unwrap_or_else(|| {
                panic!(
                    "cell type '{}' has no implementation to evaluate",
                    store.string(cell_type.name)
                )
            });
            let implementation = store.subnet(impl_id);
            let values = simulate_words(store, implementation, inputs, words);
            return implementation
                .outputs()
                .map(|o| values[o][0].clone())
                .collect();
        }
        CellSymbol::In => panic!("input cells carry no function"),
        CellSymbol::Not | CellSymbol::Nand | CellSymbol::Nor | CellSymbol::Xnor => {
            unreachable!("negative symbols normalize to positive ones")
        }
    };
    let value = if inv {
        value.into_iter().map(|w| !w).collect()
    } else {
        value
    };
    vec![value]
}

/// Simulates `subnet` on the given input words. All input vectors must
/// have the same length. Returns the port values of every entry.
pub fn simulate(store: &ObjectStore, subnet: &Subnet, inputs: &[Vec<u64>]) -> Vec<PortValues> {
    let words = inputs.first().map_or(1, |w| w.len());
    simulate_words(store, subnet, inputs, words)
}

/// Like [`simulate`], with the word count fixed by the caller so that a
/// subnet without inputs still fills `words` words per port.
fn simulate_words(
    store: &ObjectStore,
    subnet: &Subnet,
    inputs: &[Vec<u64>],
    words: usize,
) -> Vec<PortValues> {
    assert_eq!(
        inputs.len(),
        subnet.in_num(),
        "simulation needs one stimulus vector per input"
    );
    let mut values: Vec<PortValues> = Vec::with_capacity(subnet.size());
    for (i, cell) in subnet.entries().iter().enumerate() {
        if cell.is_in() {
            values.push(vec![inputs[i].clone()]);
            continue;
        }
        let operands: Vec<Vec<u64>> = cell
            .links
            .iter()
            .map(|l| link_words(&values[l.idx as usize], *l))
            .collect();
        values.push(eval_cell(store, cell, &operands, words));
    }
    values
}

fn var_words(num_vars: usize) -> Vec<Vec<u64>> {
    (0..num_vars)
        .map(|v| TruthTable::var(num_vars, v).words().to_vec())
        .collect()
}

/// Truth table of every output over all inputs.
pub fn evaluate(store: &ObjectStore, subnet: &Subnet) -> Vec<TruthTable> {
    let num_vars = subnet.in_num();
    assert!(
        num_vars <= MAX_EVAL_VARS,
        "exhaustive evaluation of {} inputs exceeds {}",
        num_vars,
        MAX_EVAL_VARS
    );
    let values = simulate(store, subnet, &var_words(num_vars));
    subnet
        .outputs()
        .map(|o| TruthTable::from_words(num_vars, values[o][0].clone()))
        .collect()
}

/// Function of the cone between `root` and `leaves`, with leaf `i` as
/// variable `i`. Constants inside the cone are evaluated; reaching an input
/// that is not a leaf is a precondition failure.
pub fn evaluate_cone<V: CellGraph>(
    store: &ObjectStore,
    view: &V,
    root: u32,
    leaves: &[u32],
) -> TruthTable {
    let num_vars = leaves.len();
    assert!(
        num_vars <= MAX_EVAL_VARS,
        "cone with {} leaves exceeds {}",
        num_vars,
        MAX_EVAL_VARS
    );
    let words = word_count(num_vars);
    let mut values: AHashMap<u32, PortValues> = AHashMap::new();
    for (leaf, var) in leaves.iter().zip(var_words(num_vars)) {
        values.insert(*leaf, vec![var]);
    }

    let mut stack = vec![(root, false)];
    while let Some((id, expanded)) = stack.pop() {
        if values.contains_key(&id) {
            continue;
        }
        let cell = view.cell(id);
        if expanded {
            let operands: Vec<Vec<u64>> = cell
                .links
                .iter()
                .map(|l| link_words(&values[&l.idx], *l))
                .collect();
            let result = eval_cell(store, cell, &operands, words);
            values.insert(id, result);
            continue;
        }
        assert!(!cell.is_in(), "input {} is not a leaf of the cut at {}", id, root);
        stack.push((id, true));
        for link in &cell.links {
            if !values.contains_key(&link.idx) {
                stack.push((link.idx, false));
            }
        }
    }
    TruthTable::from_words(num_vars, values[&root][0].clone())
}

pub fn evaluate_cut<V: CellGraph>(store: &ObjectStore, view: &V, cut: &Cut) -> TruthTable {
    evaluate_cone(store, view, cut.root, &cut.leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builder::SubnetBuilder;
    use crate::model::parser::parse_subnet;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_evaluate_majority_and_negative_symbols() {
        let mut store = ObjectStore::new();
        let text = "subnet {\n  %0 = in\n  %1 = in\n  %2 = in\n  %3 = maj(%0, %1, %2)\n  %4 = nand(%0, %1)\n  %5 = out(%3)\n  %6 = out(~%4)\n}\n";
        let id = parse_subnet(&mut store, text).unwrap();
        let tts = evaluate(&store, store.subnet(id));
        assert_eq!(tts[0].to_hex(), "e8");
        assert_eq!(tts[1].to_hex(), "88");
    }

    #[test]
    fn test_evaluate_composite_cell() {
        let mut store = ObjectStore::new();
        let mut inner = SubnetBuilder::new();
        let ins = inner.add_inputs(2);
        let x = inner.add_cell(CellSymbol::Xor, &[ins[0], ins[1]]);
        inner.add_output(!x);
        let inner = inner.make(&mut store);
        let xnor2 = store.register_composite("XNOR2", inner, None);

        let mut outer = SubnetBuilder::new();
        let ins = outer.add_inputs(2);
        let c = outer.add_cell_of_type(&store, xnor2, &[ins[0], !ins[1]]);
        outer.add_output(c);
        let outer = outer.make(&mut store);
        let tt = &evaluate(&store, store.subnet(outer))[0];
        assert_eq!(*tt, TruthTable::var(2, 0).xor(&TruthTable::var(2, 1)));
    }

    #[test]
    fn test_constant_composite_fills_wide_context() {
        let mut store = ObjectStore::new();
        let mut tie = SubnetBuilder::new();
        let one = tie.add_const(true);
        tie.add_output(one);
        let tie = tie.make(&mut store);
        let tie_hi = store.register_composite("TIEHI", tie, None);

        // Seven inputs span two words per port.
        let mut outer = SubnetBuilder::new();
        let ins = outer.add_inputs(7);
        let hi = outer.add_cell_of_type(&store, tie_hi, &[]);
        let root = outer.add_cell(CellSymbol::And, &[ins[6], hi]);
        outer.add_output(root);
        let outer = outer.make(&mut store);
        let tt = &evaluate(&store, store.subnet(outer))[0];
        assert_eq!(*tt, TruthTable::var(7, 6));
    }

    #[test]
    fn test_evaluate_cone_over_inner_leaves() {
        let store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(3);
        let ab = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        let root = builder.add_cell(CellSymbol::Or, &[!ab, ins[2]]);
        builder.add_output(root);
        let tt = evaluate_cone(&store, &builder, root.idx, &[ab.idx, ins[2].idx]);
        let expected = TruthTable::var(2, 0).not().or(&TruthTable::var(2, 1));
        assert_eq!(tt, expected);
    }
}
