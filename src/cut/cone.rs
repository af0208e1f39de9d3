// SPDX-License-Identifier: Apache-2.0

//! Extraction of the cone enclosed by a cut as a standalone subnet.

use ahash::AHashMap;

use crate::cut::Cut;
use crate::model::builder::SubnetBuilder;
use crate::model::celltype::CellSymbol;
use crate::model::object::ObjectStore;
use crate::model::subnet::{CellGraph, Link, Subnet};

#[derive(Debug, Clone)]
pub struct Cone {
    /// Inputs are the cut leaves in order; the single output is the root.
    pub subnet: Subnet,
    /// Original entry index of every cone entry.
    pub cone_to_orig: Vec<u32>,
}

pub fn cone<V: CellGraph>(store: &ObjectStore, view: &V, cut: &Cut) -> Cone {
    let mut builder = SubnetBuilder::new();
    let mut cone_to_orig: Vec<u32> = Vec::new();
    let mut mapped: AHashMap<u32, Link> = AHashMap::new();
    for leaf in &cut.leaves {
        let link = builder.add_input();
        cone_to_orig.push(*leaf);
        mapped.insert(*leaf, link);
    }

    // Post-order walk from the root down to the leaves.
    let mut stack = vec![(cut.root, false)];
    while let Some((id, expanded)) = stack.pop() {
        if mapped.contains_key(&id) {
            continue;
        }
        let cell = view.cell(id);
        if !expanded {
            assert!(!cell.is_in(), "input {} is not a leaf of the cut at {}", id, cut.root);
            stack.push((id, true));
            for link in cell.links.iter().rev() {
                if !mapped.contains_key(&link.idx) {
                    stack.push((link.idx, false));
                }
            }
            continue;
        }
        let links: Vec<Link> = cell
            .links
            .iter()
            .map(|l| {
                let base = mapped[&l.idx];
                Link {
                    out: l.out,
                    inv: base.inv ^ l.inv,
                    ..base
                }
            })
            .collect();
        let link = if cell.symbol == CellSymbol::Cell {
            builder.add_cell_of_type(store, cell.type_id, &links)
        } else {
            builder.add_cell(cell.symbol, &links)
        };
        cone_to_orig.push(id);
        mapped.insert(id, link);
    }

    builder.add_output(mapped[&cut.root]);
    cone_to_orig.push(cut.root);
    Cone {
        subnet: builder.make_subnet(),
        cone_to_orig,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::reconvergence_cut;
    use crate::function::eval::{evaluate, evaluate_cut};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cone_matches_cut_function() {
        let store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let one = builder.add_const(true);
        let a = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        let b = builder.add_cell(CellSymbol::Nand, &[ins[1], one]);
        let root = builder.add_cell(CellSymbol::And, &[a, b]);
        builder.add_output(root);

        let cut = reconvergence_cut(&builder, root.idx, 4);
        let cone = cone(&store, &builder, &cut);
        assert_eq!(cone.subnet.size(), 7);
        assert_eq!(cone.subnet.in_num(), 2);
        assert_eq!(&cone.cone_to_orig[..2], &[0, 1]);
        assert_eq!(*cone.cone_to_orig.last().unwrap(), root.idx);
        assert_eq!(
            evaluate(&store, &cone.subnet)[0],
            evaluate_cut(&store, &builder, &cut)
        );
    }

    #[test]
    fn test_trivial_cut_cone_is_a_wire() {
        let store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let root = builder.add_cell(CellSymbol::Or, &ins);
        builder.add_output(root);
        let cone = cone(&store, &builder, &Cut::trivial(root.idx));
        assert_eq!(cone.subnet.size(), 2);
        assert_eq!(cone.cone_to_orig, vec![root.idx, root.idx]);
    }
}
