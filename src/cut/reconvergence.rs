// SPDX-License-Identifier: Apache-2.0

//! Single reconvergence-driven cut per root.
//!
//! Starting from the roots, the leaf whose expansion adds the fewest new
//! entries is repeatedly replaced by its drivers, so cones that reconverge
//! are absorbed before the cut widens.

use crate::cut::Cut;
use crate::model::subnet::CellGraph;

/// Number of non-constant drivers of `idx` not yet visited; `None` for
/// entries that cannot be expanded.
fn expansion_cost<V: CellGraph>(view: &V, idx: u32, visited: &[bool]) -> Option<usize> {
    let cell = view.cell(idx);
    if cell.is_in() || cell.is_const() {
        return None;
    }
    Some(
        cell.links
            .iter()
            .filter(|l| !visited[l.idx as usize] && !view.cell(l.idx).is_const())
            .count(),
    )
}

/// Leaves of the reconvergence cut of `roots`, sorted.
pub fn reconvergence_leaves<V: CellGraph>(view: &V, roots: &[u32], cut_size: usize) -> Vec<u32> {
    assert!(
        roots.len() <= cut_size,
        "{} roots do not fit a cut of size {}",
        roots.len(),
        cut_size
    );
    let mut visited = vec![false; view.max_idx()];
    for root in roots {
        visited[*root as usize] = true;
    }
    let mut leaves: Vec<u32> = roots.to_vec();

    loop {
        let mut best: Option<(usize, usize)> = None;
        for (pos, leaf) in leaves.iter().enumerate() {
            if let Some(cost) = expansion_cost(view, *leaf, &visited) {
                if best.map_or(true, |(_, c)| cost < c) {
                    best = Some((pos, cost));
                }
                if cost == 0 {
                    break;
                }
            }
        }
        let Some((pos, cost)) = best else {
            break;
        };
        if cost + leaves.len() - 1 > cut_size {
            break;
        }
        let expanded = leaves.remove(pos);
        for link in &view.cell(expanded).links {
            let driver = link.idx;
            if !view.cell(driver).is_const() && !visited[driver as usize] {
                visited[driver as usize] = true;
                leaves.push(driver);
            }
        }
    }

    // Only constants below the roots.
    if leaves.is_empty() {
        leaves = roots.to_vec();
    }
    leaves.sort_unstable();
    leaves.dedup();
    leaves
}

pub fn reconvergence_cut<V: CellGraph>(view: &V, root: u32, cut_size: usize) -> Cut {
    Cut::new(root, reconvergence_leaves(view, &[root], cut_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builder::SubnetBuilder;
    use crate::model::celltype::CellSymbol;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_constants_are_absorbed() {
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let one = builder.add_const(true);
        let a = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        let b = builder.add_cell(CellSymbol::And, &[ins[1], one]);
        let root = builder.add_cell(CellSymbol::And, &[a, b]);
        builder.add_output(root);

        let cut = reconvergence_cut(&builder, root.idx, 4);
        assert_eq!(cut.leaves, vec![0, 1]);
        assert_eq!(cut.root, 5);

        // The constant does not count against the cut size.
        assert_eq!(reconvergence_cut(&builder, root.idx, 2).leaves, vec![0, 1]);
    }

    #[test]
    fn test_constant_only_cone_falls_back_to_root() {
        let mut builder = SubnetBuilder::new();
        builder.add_inputs(1);
        let zero = builder.add_const(false);
        let one = builder.add_const(true);
        let root = builder.add_cell(CellSymbol::Or, &[zero, one]);
        builder.add_output(root);
        assert_eq!(reconvergence_cut(&builder, root.idx, 4).leaves, vec![root.idx]);
    }

    #[test]
    fn test_input_root_is_its_own_cut() {
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let root = builder.add_cell(CellSymbol::Xor, &ins);
        builder.add_output(root);
        assert_eq!(reconvergence_cut(&builder, ins[1].idx, 4).leaves, vec![1]);
        assert_eq!(
            reconvergence_leaves(&builder, &[root.idx, ins[0].idx], 3),
            vec![0, 1]
        );
    }
}
