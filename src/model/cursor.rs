// SPDX-License-Identifier: Apache-2.0

use crate::model::builder::{EntryId, SubnetBuilder};

/// Walks a builder in topological order while the builder is being
/// rewritten.
///
/// The successor of the current entry is captured before the entry is
/// handed out, and entries created after the cursor was opened are skipped.
/// A pass therefore visits each pre-existing live entry at most once, even
/// when `replace` splices new cells in front of the current root or removes
/// cells behind it.
#[derive(Debug, Clone)]
pub struct EntryCursor {
    next: Option<EntryId>,
    bound: usize,
}

impl EntryCursor {
    pub fn new(builder: &SubnetBuilder) -> Self {
        Self {
            next: builder.first(),
            bound: builder.max_id(),
        }
    }

    /// Next pre-existing live entry, or `None` at the end of the pass.
    pub fn next(&mut self, builder: &SubnetBuilder) -> Option<EntryId> {
        while let Some(id) = self.next {
            self.next = builder.next(id);
            if (id as usize) < self.bound && builder.is_alive(id) {
                return Some(id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builder::InOutMapping;
    use crate::model::celltype::CellSymbol;
    use crate::model::object::ObjectStore;

    #[test]
    fn test_cursor_survives_replace() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(3);
        let ab = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        let ac = builder.add_cell(CellSymbol::And, &[ins[0], ins[2]]);
        let root = builder.add_cell(CellSymbol::Or, &[ab, ac]);
        builder.add_output(root);

        let mut rhs = SubnetBuilder::new();
        let r = rhs.add_inputs(3);
        let bc = rhs.add_cell(CellSymbol::Or, &[r[1], r[2]]);
        let top = rhs.add_cell(CellSymbol::And, &[r[0], bc]);
        rhs.add_output(top);
        let rhs = rhs.make(&mut store);

        let mut cursor = EntryCursor::new(&builder);
        let mut visited = Vec::new();
        while let Some(id) = cursor.next(&builder) {
            visited.push(id);
            if id == root.idx {
                let mapping = InOutMapping::new(vec![0, 1, 2], root.idx);
                builder.replace(&store, rhs, &mapping);
            }
        }
        assert_eq!(visited, vec![0, 1, 2, 3, 4, 5, 6]);
        // The spliced-in cell sits before the root and was never visited.
        assert_eq!(builder.iter().collect::<Vec<_>>(), vec![0, 1, 2, 7, 5, 6]);
    }

    #[test]
    fn test_cursor_skips_removed_entries() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let x = builder.add_cell(CellSymbol::Xor, &[ins[0], ins[1]]);
        let y = builder.add_cell(CellSymbol::Buf, &[x]);
        let root = builder.add_cell(CellSymbol::Buf, &[y]);
        builder.add_output(root);

        let mut rhs = SubnetBuilder::new();
        let r = rhs.add_inputs(2);
        let xor = rhs.add_cell(CellSymbol::Xor, &[r[0], r[1]]);
        rhs.add_output(xor);
        let rhs = rhs.make(&mut store);

        let mut cursor = EntryCursor::new(&builder);
        let mut visited = Vec::new();
        while let Some(id) = cursor.next(&builder) {
            visited.push(id);
            if id == x.idx {
                // Rewriting the last buffer frees the chain x, y behind it.
                let mapping = InOutMapping::new(vec![0, 1], root.idx);
                builder.replace(&store, rhs, &mapping);
            }
        }
        assert_eq!(visited, vec![0, 1, 2, 4, 5]);
    }
}
