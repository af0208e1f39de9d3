// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::model::celltype::CellSymbol;
use crate::model::object::{CellTypeId, ObjectStore};

/// A driver reference: source entry, output port of that entry, polarity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Link {
    pub idx: u32,
    pub out: u16,
    pub inv: bool,
}

impl Link {
    pub fn new(idx: u32) -> Self {
        Self {
            idx,
            out: 0,
            inv: false,
        }
    }

    pub fn with_port(idx: u32, out: u16) -> Self {
        Self {
            idx,
            out,
            inv: false,
        }
    }

    pub fn inverted_if(self, inv: bool) -> Self {
        Self {
            inv: self.inv ^ inv,
            ..self
        }
    }

    pub fn positive(self) -> Self {
        Self { inv: false, ..self }
    }
}

impl std::ops::Not for Link {
    type Output = Link;

    fn not(self) -> Link {
        self.inverted_if(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    pub type_id: CellTypeId,
    pub symbol: CellSymbol,
    pub links: Vec<Link>,
}

impl Cell {
    pub fn is_in(&self) -> bool {
        self.symbol == CellSymbol::In
    }

    pub fn is_out(&self) -> bool {
        self.symbol == CellSymbol::Out
    }

    pub fn is_const(&self) -> bool {
        self.symbol.is_const()
    }

    pub fn arity(&self) -> usize {
        self.links.len()
    }
}

/// Read-only access to a topologically ordered cell graph, shared by
/// finalized subnets and builders.
pub trait CellGraph {
    /// Exclusive upper bound on entry indices.
    fn max_idx(&self) -> usize;

    fn cell(&self, idx: u32) -> &Cell;

    /// Live entries in topological order.
    fn order(&self) -> Vec<u32>;
}

/// Immutable combinational circuit. Inputs form the prefix of the entry
/// sequence and outputs the suffix; every link of entry `i` points below `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    entries: Vec<Cell>,
    in_num: usize,
    out_num: usize,
}

impl Subnet {
    pub(crate) fn from_parts(entries: Vec<Cell>, in_num: usize, out_num: usize) -> Self {
        let subnet = Self {
            entries,
            in_num,
            out_num,
        };
        subnet.check_invariants_with_debug_assert();
        subnet
    }

    /// For decoders that report invariant violations as errors.
    pub(crate) fn from_parts_unchecked(entries: Vec<Cell>, in_num: usize, out_num: usize) -> Self {
        Self {
            entries,
            in_num,
            out_num,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Cell] {
        &self.entries
    }

    pub fn in_num(&self) -> usize {
        self.in_num
    }

    pub fn out_num(&self) -> usize {
        self.out_num
    }

    /// Number of entries that are neither inputs nor outputs.
    pub fn cell_count(&self) -> usize {
        self.entries.len() - self.in_num - self.out_num
    }

    pub fn links(&self, idx: usize) -> &[Link] {
        &self.entries[idx].links
    }

    pub fn inputs(&self) -> std::ops::Range<usize> {
        0..self.in_num
    }

    pub fn outputs(&self) -> std::ops::Range<usize> {
        (self.entries.len() - self.out_num)..self.entries.len()
    }

    /// Driver of the `i`-th output.
    pub fn output_link(&self, i: usize) -> Link {
        let idx = self.entries.len() - self.out_num + i;
        self.entries[idx].links[0]
    }

    /// Logic depth of every entry. Inputs, constants and identity cells add
    /// no level.
    pub fn depths(&self) -> Vec<u32> {
        let mut depths = vec![0u32; self.entries.len()];
        for (i, cell) in self.entries.iter().enumerate() {
            let depth = cell_depth(cell, |idx| depths[idx as usize]);
            depths[i] = depth;
        }
        depths
    }

    /// Minimum and maximum depth over the outputs.
    pub fn path_length(&self) -> (u32, u32) {
        let depths = self.depths();
        let mut min = u32::MAX;
        let mut max = 0;
        for i in self.outputs() {
            min = min.min(depths[i]);
            max = max.max(depths[i]);
        }
        if self.out_num == 0 { (0, 0) } else { (min, max) }
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        if self.in_num + self.out_num > self.entries.len() {
            return Err(format!(
                "in_num {} + out_num {} exceeds size {}",
                self.in_num,
                self.out_num,
                self.entries.len()
            ));
        }
        let out_start = self.entries.len() - self.out_num;
        for (i, cell) in self.entries.iter().enumerate() {
            if (i < self.in_num) != cell.is_in() {
                return Err(format!("entry {} breaks the input prefix", i));
            }
            if (i >= out_start) != cell.is_out() {
                return Err(format!("entry {} breaks the output suffix", i));
            }
            for link in &cell.links {
                if link.idx as usize >= i {
                    return Err(format!(
                        "entry {} links forward to entry {}",
                        i, link.idx
                    ));
                }
                if self.entries[link.idx as usize].is_out() {
                    return Err(format!("entry {} is driven by output {}", i, link.idx));
                }
            }
        }
        Ok(())
    }

    pub fn check_invariants_with_debug_assert(&self) {
        if cfg!(debug_assertions) {
            if let Err(e) = self.check_invariants() {
                panic!("subnet invariant violated: {}", e);
            }
        }
    }

    /// Text form accepted by [`crate::model::parser::parse_subnet`].
    pub fn to_string(&self, store: &ObjectStore) -> String {
        let mut s = String::from("subnet {\n");
        for (i, cell) in self.entries.iter().enumerate() {
            let name = store.cell_type_name(cell.type_id);
            if cell.links.is_empty() {
                s.push_str(&format!("  %{} = {}\n", i, name));
                continue;
            }
            let links = cell
                .links
                .iter()
                .map(|l| link_to_string(*l))
                .collect::<Vec<String>>()
                .join(", ");
            s.push_str(&format!("  %{} = {}({})\n", i, name, links));
        }
        s.push('}');
        s.push('\n');
        s
    }
}

pub fn link_to_string(link: Link) -> String {
    let mut s = String::new();
    if link.inv {
        s.push('~');
    }
    s.push_str(&format!("%{}", link.idx));
    if link.out != 0 {
        s.push_str(&format!(".{}", link.out));
    }
    s
}

pub(crate) fn cell_depth(cell: &Cell, depth_of: impl Fn(u32) -> u32) -> u32 {
    let max = cell.links.iter().map(|l| depth_of(l.idx)).max().unwrap_or(0);
    match cell.symbol {
        CellSymbol::In | CellSymbol::Zero | CellSymbol::One => 0,
        CellSymbol::Buf | CellSymbol::Out => max,
        _ => max + 1,
    }
}

impl CellGraph for Subnet {
    fn max_idx(&self) -> usize {
        self.entries.len()
    }

    fn cell(&self, idx: u32) -> &Cell {
        &self.entries[idx as usize]
    }

    fn order(&self) -> Vec<u32> {
        (0..self.entries.len() as u32).collect()
    }
}
