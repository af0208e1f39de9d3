// SPDX-License-Identifier: Apache-2.0

//! Mutable working copy of a subnet.
//!
//! Entries live in an append-only vector indexed by [`EntryId`]; their
//! topological order is kept separately as a doubly linked list so that
//! `replace` can splice new cells in front of the rewritten root without
//! renumbering anything. Entry ids are therefore stable for the life of the
//! builder, and a removed entry keeps its successor pointer so an in-flight
//! cursor can step past it.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use crate::model::celltype::CellSymbol;
use crate::model::object::{CellTypeId, ObjectStore, SubnetId, builtin_cell_type};
use crate::model::subnet::{Cell, CellGraph, Link, Subnet, cell_depth};

pub type EntryId = u32;
pub const INVALID_ID: EntryId = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetBuilderOptions {
    /// Simplify constant operands, duplicate operands and buffers on
    /// construction.
    pub fold: bool,
    /// Reuse a structurally identical live cell instead of appending one.
    pub strash: bool,
}

impl SubnetBuilderOptions {
    pub fn opt() -> Self {
        Self {
            fold: true,
            strash: true,
        }
    }

    pub fn no_opt() -> Self {
        Self {
            fold: false,
            strash: false,
        }
    }
}

impl Default for SubnetBuilderOptions {
    fn default() -> Self {
        Self::no_opt()
    }
}

/// Binds the inputs of a replacement subnet to builder entries (the cut
/// leaves) and its single output to the entry being replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InOutMapping {
    pub inputs: Vec<EntryId>,
    pub output: EntryId,
}

impl InOutMapping {
    pub fn new(inputs: Vec<EntryId>, output: EntryId) -> Self {
        Self { inputs, output }
    }
}

/// Predicted change caused by a replacement: live cell count and the depth
/// of the replaced root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Effect {
    pub size: i64,
    pub depth: i64,
}

#[derive(Debug, Clone)]
struct Entry {
    cell: Cell,
    /// One element per referencing link, so the length is the refcount.
    fanouts: Vec<EntryId>,
    depth: u32,
    prev: EntryId,
    next: EntryId,
    alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StrashKey {
    type_id: CellTypeId,
    links: Vec<Link>,
}

impl StrashKey {
    fn of(cell: &Cell) -> Self {
        let mut links = cell.links.clone();
        if cell.symbol.properties().commutative {
            links.sort();
        }
        Self {
            type_id: cell.type_id,
            links,
        }
    }
}

enum Folded {
    Link(Link),
    Cell(Vec<Link>, bool),
}

pub struct SubnetBuilder {
    entries: Vec<Entry>,
    head: EntryId,
    tail: EntryId,
    last_input: EntryId,
    first_output: EntryId,
    in_num: usize,
    out_num: usize,
    options: SubnetBuilderOptions,
    strash: AHashMap<StrashKey, EntryId>,
}

impl SubnetBuilder {
    pub fn new() -> Self {
        Self::with_options(SubnetBuilderOptions::no_opt())
    }

    pub fn with_options(options: SubnetBuilderOptions) -> Self {
        Self {
            entries: Vec::new(),
            head: INVALID_ID,
            tail: INVALID_ID,
            last_input: INVALID_ID,
            first_output: INVALID_ID,
            in_num: 0,
            out_num: 0,
            options,
            strash: AHashMap::new(),
        }
    }

    /// Copies `subnet` entry by entry; builder ids equal subnet indices.
    pub fn from_subnet(subnet: &Subnet) -> Self {
        let mut builder = Self::new();
        for cell in subnet.entries() {
            if cell.is_in() {
                builder.add_input();
            } else if cell.is_out() {
                builder.add_output(cell.links[0]);
            } else {
                builder.push_cell(cell.clone());
            }
        }
        debug_assert_eq!(builder.entries.len(), subnet.size());
        builder
    }

    pub fn options(&self) -> SubnetBuilderOptions {
        self.options
    }

    pub fn in_num(&self) -> usize {
        self.in_num
    }

    pub fn out_num(&self) -> usize {
        self.out_num
    }

    /// Exclusive bound on every id handed out so far.
    pub fn max_id(&self) -> usize {
        self.entries.len()
    }

    pub fn is_alive(&self, id: EntryId) -> bool {
        self.entries
            .get(id as usize)
            .map_or(false, |entry| entry.alive)
    }

    pub fn cell(&self, id: EntryId) -> &Cell {
        &self.entries[id as usize].cell
    }

    pub fn depth(&self, id: EntryId) -> u32 {
        self.entries[id as usize].depth
    }

    pub fn refcount(&self, id: EntryId) -> usize {
        self.entries[id as usize].fanouts.len()
    }

    pub fn fanouts(&self, id: EntryId) -> &[EntryId] {
        &self.entries[id as usize].fanouts
    }

    pub fn first(&self) -> Option<EntryId> {
        (self.head != INVALID_ID).then_some(self.head)
    }

    /// Successor in topological order; also valid for removed entries.
    pub fn next(&self, id: EntryId) -> Option<EntryId> {
        let next = self.entries[id as usize].next;
        (next != INVALID_ID).then_some(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = EntryId> + '_ {
        std::iter::successors(self.first(), move |id| self.next(*id))
    }

    pub fn inputs(&self) -> Vec<EntryId> {
        self.iter()
            .filter(|id| self.cell(*id).is_in())
            .collect()
    }

    pub fn outputs(&self) -> Vec<EntryId> {
        self.iter()
            .filter(|id| self.cell(*id).is_out())
            .collect()
    }

    /// Live entries that are neither inputs nor outputs.
    pub fn cell_count(&self) -> usize {
        self.iter()
            .filter(|id| {
                let cell = self.cell(*id);
                !cell.is_in() && !cell.is_out()
            })
            .count()
    }

    /// Maximum depth over the outputs.
    pub fn max_depth(&self) -> u32 {
        self.outputs()
            .into_iter()
            .map(|id| self.depth(id))
            .max()
            .unwrap_or(0)
    }

    pub fn add_input(&mut self) -> Link {
        let id = self.new_entry(Cell {
            type_id: builtin_cell_type(CellSymbol::In),
            symbol: CellSymbol::In,
            links: Vec::new(),
        });
        let next = if self.last_input == INVALID_ID {
            self.head
        } else {
            self.entries[self.last_input as usize].next
        };
        self.link_between(self.last_input, id, next);
        self.last_input = id;
        self.in_num += 1;
        Link::new(id)
    }

    pub fn add_inputs(&mut self, n: usize) -> Vec<Link> {
        (0..n).map(|_| self.add_input()).collect()
    }

    pub fn add_output(&mut self, link: Link) -> EntryId {
        self.check_driver(link);
        let id = self.new_entry(Cell {
            type_id: builtin_cell_type(CellSymbol::Out),
            symbol: CellSymbol::Out,
            links: vec![link],
        });
        self.link_between(self.tail, id, INVALID_ID);
        if self.first_output == INVALID_ID {
            self.first_output = id;
        }
        self.out_num += 1;
        id
    }

    /// Adds a built-in cell. Negative symbols are stored in positive form
    /// with the inversion on the returned link.
    pub fn add_cell(&mut self, symbol: CellSymbol, links: &[Link]) -> Link {
        assert!(
            !matches!(symbol, CellSymbol::In | CellSymbol::Out | CellSymbol::Cell),
            "{} cells are not added through add_cell",
            symbol.name()
        );
        let (in_min, in_max) = symbol.arity_bounds();
        assert!(
            (in_min as usize) <= links.len() && links.len() <= (in_max as usize),
            "{} does not accept {} inputs",
            symbol.name(),
            links.len()
        );
        let (symbol, inv) = symbol.positive();
        self.add_positive(builtin_cell_type(symbol), symbol, links.to_vec())
            .inverted_if(inv)
    }

    /// Adds a cell of any registered type; composite types keep their type
    /// handle so the cell can later be expanded through its implementation.
    pub fn add_cell_of_type(
        &mut self,
        store: &ObjectStore,
        type_id: CellTypeId,
        links: &[Link],
    ) -> Link {
        let cell_type = store.cell_type(type_id);
        if cell_type.symbol != CellSymbol::Cell {
            return self.add_cell(cell_type.symbol, links);
        }
        assert!(
            cell_type.accepts_arity(links.len()),
            "{} does not accept {} inputs",
            store.string(cell_type.name),
            links.len()
        );
        self.add_positive(type_id, CellSymbol::Cell, links.to_vec())
    }

    pub fn add_const(&mut self, value: bool) -> Link {
        let symbol = if value {
            CellSymbol::One
        } else {
            CellSymbol::Zero
        };
        self.add_positive(builtin_cell_type(symbol), symbol, Vec::new())
    }

    /// Builds a balanced tree of a regroupable operator with at most
    /// `max_arity` operands per cell.
    pub fn add_cell_tree(&mut self, symbol: CellSymbol, links: &[Link], max_arity: u16) -> Link {
        assert!(
            symbol.properties().regroupable,
            "{} cannot be regrouped into a tree",
            symbol.name()
        );
        let max_arity = (max_arity as usize).max(2);
        match links.len() {
            0 => return self.add_const(symbol == CellSymbol::And),
            1 => return links[0],
            n if n <= max_arity => return self.add_cell(symbol, links),
            _ => {}
        }
        let mut level: Vec<Link> = links.to_vec();
        while level.len() > 1 {
            let mut next_level = Vec::with_capacity(level.len() / max_arity + 1);
            for chunk in level.chunks(max_arity) {
                if chunk.len() == 1 {
                    next_level.push(chunk[0]);
                } else {
                    next_level.push(self.add_cell(symbol, chunk));
                }
            }
            level = next_level;
        }
        level[0]
    }

    /// Instantiates `subnet` with its inputs bound to `links`; returns the
    /// links driving its outputs.
    pub fn add_subnet(&mut self, subnet: &Subnet, links: &[Link]) -> Vec<Link> {
        assert_eq!(
            links.len(),
            subnet.in_num(),
            "subnet with {} inputs instantiated with {} links",
            subnet.in_num(),
            links.len()
        );
        let mut map: Vec<Link> = Vec::with_capacity(subnet.size());
        let mut outputs = Vec::with_capacity(subnet.out_num());
        for (i, cell) in subnet.entries().iter().enumerate() {
            if cell.is_in() {
                map.push(links[i]);
            } else if cell.is_out() {
                outputs.push(remap_link(&map, cell.links[0]));
                map.push(Link::default());
            } else {
                let new_links: Vec<Link> =
                    cell.links.iter().map(|l| remap_link(&map, *l)).collect();
                let link = self.add_positive(cell.type_id, cell.symbol, new_links);
                map.push(link);
            }
        }
        outputs
    }

    /// Replaces the cone rooted at `mapping.output` by the single-output
    /// subnet `rhs`.
    ///
    /// New cells are placed right before the root in topological order. The
    /// root entry keeps its id: it is rewritten in place with the last cell
    /// of `rhs`, or becomes a buffer when `rhs` drives its output through an
    /// inverted link or directly from an input. Cells of the old cone left
    /// without fanout are removed.
    pub fn replace(&mut self, store: &ObjectStore, rhs_id: SubnetId, mapping: &InOutMapping) {
        let rhs = store.subnet(rhs_id);
        let root = mapping.output;
        self.check_replacement(rhs, mapping);

        let out_link = rhs.output_link(0);
        let in_place = is_in_place(rhs, out_link);

        let mut map: Vec<Link> = vec![Link::default(); rhs.size()];
        for (i, leaf) in mapping.inputs.iter().enumerate() {
            map[i] = Link::new(*leaf);
        }
        let mut root_cell = None;
        for i in rhs.in_num()..(rhs.size() - rhs.out_num()) {
            let cell = &rhs.entries()[i];
            let links: Vec<Link> = cell.links.iter().map(|l| remap_link(&map, *l)).collect();
            let new_cell = Cell {
                type_id: cell.type_id,
                symbol: cell.symbol,
                links,
            };
            if in_place && i == out_link.idx as usize {
                root_cell = Some(new_cell);
            } else {
                let id = self.new_entry(new_cell);
                let prev = self.entries[root as usize].prev;
                self.link_between(prev, id, root);
                self.strash_insert(id);
                map[i] = Link::new(id);
            }
        }
        let root_cell = root_cell.unwrap_or_else(|| Cell {
            type_id: builtin_cell_type(CellSymbol::Buf),
            symbol: CellSymbol::Buf,
            links: vec![remap_link(&map, out_link)],
        });
        log::trace!(
            "replace: root={} new_cells={} in_place={}",
            root,
            rhs.cell_count() - usize::from(in_place),
            in_place
        );
        self.rewrite_cell(root, root_cell);
        self.update_depths_from(root);
    }

    /// Predicts the effect of [`SubnetBuilder::replace`] without mutating
    /// the builder.
    pub fn evaluate_replace(
        &self,
        store: &ObjectStore,
        rhs_id: SubnetId,
        mapping: &InOutMapping,
    ) -> Effect {
        let rhs = store.subnet(rhs_id);
        let root = mapping.output;
        self.check_replacement(rhs, mapping);

        let out_link = rhs.output_link(0);
        let in_place = is_in_place(rhs, out_link);
        let added = rhs.cell_count() as i64 - i64::from(in_place);

        let mut depths = vec![0u32; rhs.size()];
        for (i, leaf) in mapping.inputs.iter().enumerate() {
            depths[i] = self.depth(*leaf);
        }
        for i in rhs.in_num()..rhs.size() {
            let depth = cell_depth(&rhs.entries()[i], |j| depths[j as usize]);
            depths[i] = depth;
        }
        let new_depth = depths[out_link.idx as usize] as i64;

        // Leaves gain one reference per use by the new cells before the old
        // root links are released.
        let mut delta: AHashMap<EntryId, i64> = AHashMap::new();
        let mut count_leaf_use = |link: &Link| {
            if (link.idx as usize) < rhs.in_num() {
                *delta.entry(mapping.inputs[link.idx as usize]).or_insert(0) += 1;
            }
        };
        for i in rhs.in_num()..(rhs.size() - rhs.out_num()) {
            rhs.entries()[i].links.iter().for_each(&mut count_leaf_use);
        }
        if !in_place {
            count_leaf_use(&out_link);
        }

        let mut worklist = Vec::new();
        for link in &self.cell(root).links {
            *delta.entry(link.idx).or_insert(0) -= 1;
            worklist.push(link.idx);
        }
        let mut removed = 0i64;
        let mut dead: AHashSet<EntryId> = AHashSet::new();
        while let Some(id) = worklist.pop() {
            let cell = self.cell(id);
            if dead.contains(&id) || cell.is_in() || cell.is_out() {
                continue;
            }
            let refs = self.refcount(id) as i64 + delta.get(&id).copied().unwrap_or(0);
            if refs > 0 {
                continue;
            }
            dead.insert(id);
            removed += 1;
            for link in &cell.links {
                *delta.entry(link.idx).or_insert(0) -= 1;
                worklist.push(link.idx);
            }
        }

        Effect {
            size: added - removed,
            depth: new_depth - self.depth(root) as i64,
        }
    }

    /// Finalizes the live part of the builder: inputs, then cells reachable
    /// from outputs in topological order, then outputs.
    pub fn make_subnet(&self) -> Subnet {
        let mut live = vec![false; self.entries.len()];
        let mut stack: Vec<EntryId> = self.outputs();
        while let Some(id) = stack.pop() {
            if live[id as usize] {
                continue;
            }
            live[id as usize] = true;
            stack.extend(self.cell(id).links.iter().map(|l| l.idx));
        }

        let order: Vec<EntryId> = self.iter().collect();
        let mut new_index = vec![INVALID_ID; self.entries.len()];
        let mut cells = Vec::with_capacity(order.len());
        let inputs = order.iter().filter(|id| self.cell(**id).is_in());
        let inner = order.iter().filter(|id| {
            let cell = self.cell(**id);
            live[**id as usize] && !cell.is_in() && !cell.is_out()
        });
        let outputs = order.iter().filter(|id| self.cell(**id).is_out());
        for id in inputs.chain(inner).chain(outputs) {
            let cell = self.cell(*id);
            let links = cell
                .links
                .iter()
                .map(|l| {
                    let idx = new_index[l.idx as usize];
                    assert_ne!(idx, INVALID_ID, "entry {} links to a dropped entry", id);
                    Link { idx, ..*l }
                })
                .collect();
            new_index[*id as usize] = cells.len() as u32;
            cells.push(Cell {
                type_id: cell.type_id,
                symbol: cell.symbol,
                links,
            });
        }
        Subnet::from_parts(cells, self.in_num, self.out_num)
    }

    pub fn make(&self, store: &mut ObjectStore) -> SubnetId {
        store.allocate(self.make_subnet())
    }

    fn check_replacement(&self, rhs: &Subnet, mapping: &InOutMapping) {
        assert_eq!(
            rhs.out_num(),
            1,
            "replacement subnet must have a single output"
        );
        assert_eq!(
            rhs.in_num(),
            mapping.inputs.len(),
            "replacement has {} inputs but {} leaves are bound",
            rhs.in_num(),
            mapping.inputs.len()
        );
        let root = mapping.output;
        assert!(self.is_alive(root), "replacing removed entry {}", root);
        let cell = self.cell(root);
        assert!(
            !cell.is_in() && !cell.is_out(),
            "entry {} is an input or output and cannot be replaced",
            root
        );
        assert!(
            !mapping.inputs.contains(&root),
            "root {} is bound as a leaf of its own replacement",
            root
        );
        for leaf in &mapping.inputs {
            assert!(self.is_alive(*leaf), "leaf {} was removed", leaf);
        }
    }

    fn check_driver(&self, link: Link) {
        let entry = self
            .entries
            .get(link.idx as usize)
            .unwrap_or_else(|| panic!("link to unknown entry {}", link.idx));
        assert!(entry.alive, "link to removed entry {}", link.idx);
        assert!(!entry.cell.is_out(), "link to output entry {}", link.idx);
    }

    fn add_positive(&mut self, type_id: CellTypeId, symbol: CellSymbol, links: Vec<Link>) -> Link {
        for link in &links {
            self.check_driver(*link);
        }
        let (links, inv) = if self.options.fold {
            match self.fold(symbol, links) {
                Folded::Link(link) => return link,
                Folded::Cell(links, inv) => (links, inv),
            }
        } else {
            (links, false)
        };
        let cell = Cell {
            type_id,
            symbol,
            links,
        };
        if self.options.strash {
            if let Some(id) = self.strash.get(&StrashKey::of(&cell)) {
                return Link::new(*id).inverted_if(inv);
            }
        }
        Link::new(self.push_cell(cell)).inverted_if(inv)
    }

    /// Appends a cell in front of the outputs.
    fn push_cell(&mut self, cell: Cell) -> EntryId {
        let id = self.new_entry(cell);
        let (prev, next) = if self.first_output == INVALID_ID {
            (self.tail, INVALID_ID)
        } else {
            (
                self.entries[self.first_output as usize].prev,
                self.first_output,
            )
        };
        self.link_between(prev, id, next);
        self.strash_insert(id);
        id
    }

    fn const_value(&self, link: Link) -> Option<bool> {
        match self.cell(link.idx).symbol {
            CellSymbol::Zero => Some(link.inv),
            CellSymbol::One => Some(!link.inv),
            _ => None,
        }
    }

    fn fold(&mut self, symbol: CellSymbol, links: Vec<Link>) -> Folded {
        match symbol {
            CellSymbol::Buf => Folded::Link(links[0]),
            CellSymbol::And | CellSymbol::Or => {
                // AND absorbs on 0 and drops 1; OR is the dual.
                let absorbing = symbol == CellSymbol::Or;
                let mut kept: Vec<Link> = Vec::with_capacity(links.len());
                for link in links {
                    match self.const_value(link) {
                        Some(v) if v == absorbing => return Folded::Link(self.add_const(absorbing)),
                        Some(_) => continue,
                        None => {}
                    }
                    if kept.contains(&!link) {
                        return Folded::Link(self.add_const(absorbing));
                    }
                    if !kept.contains(&link) {
                        kept.push(link);
                    }
                }
                match kept.len() {
                    0 => Folded::Link(self.add_const(!absorbing)),
                    1 => Folded::Link(kept[0]),
                    _ => Folded::Cell(kept, false),
                }
            }
            CellSymbol::Xor => {
                let mut parity = false;
                let mut kept: Vec<Link> = Vec::with_capacity(links.len());
                for link in links {
                    if let Some(v) = self.const_value(link) {
                        parity ^= v;
                        continue;
                    }
                    if let Some(pos) = kept.iter().position(|k| k.positive() == link.positive()) {
                        parity ^= kept[pos].inv ^ link.inv;
                        kept.remove(pos);
                        continue;
                    }
                    kept.push(link);
                }
                match kept.len() {
                    0 => Folded::Link(self.add_const(parity)),
                    1 => Folded::Link(kept[0].inverted_if(parity)),
                    _ => Folded::Cell(kept, parity),
                }
            }
            _ => Folded::Cell(links, false),
        }
    }

    fn new_entry(&mut self, cell: Cell) -> EntryId {
        let id = self.entries.len() as EntryId;
        let depth = cell_depth(&cell, |i| self.entries[i as usize].depth);
        for link in &cell.links {
            self.entries[link.idx as usize].fanouts.push(id);
        }
        self.entries.push(Entry {
            cell,
            fanouts: Vec::new(),
            depth,
            prev: INVALID_ID,
            next: INVALID_ID,
            alive: true,
        });
        id
    }

    fn link_between(&mut self, prev: EntryId, id: EntryId, next: EntryId) {
        self.entries[id as usize].prev = prev;
        self.entries[id as usize].next = next;
        if prev == INVALID_ID {
            self.head = id;
        } else {
            self.entries[prev as usize].next = id;
        }
        if next == INVALID_ID {
            self.tail = id;
        } else {
            self.entries[next as usize].prev = id;
        }
    }

    /// Removes `id` from the order but leaves its own `next` in place.
    fn unlink(&mut self, id: EntryId) {
        let (prev, next) = {
            let entry = &self.entries[id as usize];
            (entry.prev, entry.next)
        };
        if prev == INVALID_ID {
            self.head = next;
        } else {
            self.entries[prev as usize].next = next;
        }
        if next == INVALID_ID {
            self.tail = prev;
        } else {
            self.entries[next as usize].prev = prev;
        }
    }

    fn strash_insert(&mut self, id: EntryId) {
        if self.options.strash {
            let key = StrashKey::of(self.cell(id));
            self.strash.entry(key).or_insert(id);
        }
    }

    fn strash_remove(&mut self, id: EntryId) {
        if self.options.strash {
            let key = StrashKey::of(self.cell(id));
            if self.strash.get(&key) == Some(&id) {
                self.strash.remove(&key);
            }
        }
    }

    fn remove_fanout(&mut self, driver: EntryId, user: EntryId) {
        let fanouts = &mut self.entries[driver as usize].fanouts;
        if let Some(pos) = fanouts.iter().position(|f| *f == user) {
            fanouts.swap_remove(pos);
        }
    }

    fn rewrite_cell(&mut self, root: EntryId, cell: Cell) {
        self.strash_remove(root);
        for link in &cell.links {
            self.entries[link.idx as usize].fanouts.push(root);
        }
        let old = std::mem::replace(&mut self.entries[root as usize].cell, cell);
        for link in &old.links {
            self.remove_fanout(link.idx, root);
        }
        self.strash_insert(root);

        let mut worklist: Vec<EntryId> = old.links.iter().map(|l| l.idx).collect();
        while let Some(id) = worklist.pop() {
            let entry = &self.entries[id as usize];
            if !entry.alive || !entry.fanouts.is_empty() || entry.cell.is_in() || entry.cell.is_out()
            {
                continue;
            }
            self.strash_remove(id);
            self.entries[id as usize].alive = false;
            self.unlink(id);
            let links = self.entries[id as usize].cell.links.clone();
            for link in links {
                self.remove_fanout(link.idx, id);
                worklist.push(link.idx);
            }
        }
    }

    fn update_depths_from(&mut self, root: EntryId) {
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let depth = {
                let entries = &self.entries;
                cell_depth(&entries[id as usize].cell, |i| entries[i as usize].depth)
            };
            let entry = &mut self.entries[id as usize];
            if depth != entry.depth || id == root {
                entry.depth = depth;
                queue.extend(entry.fanouts.iter().copied());
            }
        }
    }
}

impl Default for SubnetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CellGraph for SubnetBuilder {
    fn max_idx(&self) -> usize {
        self.entries.len()
    }

    fn cell(&self, idx: u32) -> &Cell {
        &self.entries[idx as usize].cell
    }

    fn order(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

/// The root can take over the replacement's last cell when that cell drives
/// the output directly.
fn is_in_place(rhs: &Subnet, out_link: Link) -> bool {
    let idx = out_link.idx as usize;
    !out_link.inv && out_link.out == 0 && idx >= rhs.in_num() && idx == rhs.size() - rhs.out_num() - 1
}

fn remap_link(map: &[Link], link: Link) -> Link {
    let base = map[link.idx as usize];
    Link {
        idx: base.idx,
        out: if link.out != 0 { link.out } else { base.out },
        inv: base.inv ^ link.inv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::eval::evaluate;
    use pretty_assertions::assert_eq;

    fn and_or_cone() -> (SubnetBuilder, Vec<Link>, Link) {
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(3);
        let ab = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        let ac = builder.add_cell(CellSymbol::And, &[ins[0], ins[2]]);
        let root = builder.add_cell(CellSymbol::Or, &[ab, ac]);
        builder.add_output(root);
        (builder, ins, root)
    }

    /// a & (b | c) over three inputs.
    fn factored(store: &mut ObjectStore) -> SubnetId {
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(3);
        let bc = builder.add_cell(CellSymbol::Or, &[ins[1], ins[2]]);
        let root = builder.add_cell(CellSymbol::And, &[ins[0], bc]);
        builder.add_output(root);
        builder.make(store)
    }

    #[test]
    fn test_add_cell_tree_is_balanced() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(8);
        let root = builder.add_cell_tree(CellSymbol::And, &ins, 2);
        builder.add_output(root);
        assert_eq!(builder.cell_count(), 7);
        assert_eq!(builder.max_depth(), 3);

        let id = builder.make(&mut store);
        let tt = &evaluate(&store, store.subnet(id))[0];
        assert_eq!(tt.count_ones(), 1);
    }

    #[test]
    fn test_add_cell_tree_respects_wide_arity() {
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(9);
        let root = builder.add_cell_tree(CellSymbol::Or, &ins, 3);
        builder.add_output(root);
        assert_eq!(builder.cell_count(), 4);
        assert_eq!(builder.max_depth(), 2);
    }

    #[test]
    fn test_strash_reuses_commutative_cells() {
        let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::opt());
        let ins = builder.add_inputs(2);
        let a = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        let b = builder.add_cell(CellSymbol::And, &[ins[1], ins[0]]);
        let c = builder.add_cell(CellSymbol::Nand, &[ins[0], ins[1]]);
        assert_eq!(a, b);
        assert_eq!(c, !a);
        assert_eq!(builder.cell_count(), 1);
    }

    #[test]
    fn test_fold_simplifies_constants_and_duplicates() {
        let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::opt());
        let ins = builder.add_inputs(2);
        let one = builder.add_const(true);
        assert_eq!(builder.add_cell(CellSymbol::And, &[ins[0], one]), ins[0]);
        assert_eq!(builder.add_cell(CellSymbol::Or, &[ins[0], ins[0]]), ins[0]);
        let contradiction = builder.add_cell(CellSymbol::And, &[ins[0], !ins[0]]);
        assert_eq!(builder.cell(contradiction.idx).symbol, CellSymbol::Zero);
        let x = builder.add_cell(CellSymbol::Xor, &[ins[0], ins[1], ins[0]]);
        assert_eq!(x, ins[1]);
        assert_eq!(builder.add_cell(CellSymbol::Not, &[ins[1]]), !ins[1]);
    }

    #[test]
    fn test_replace_in_place_keeps_function_and_shrinks() {
        let mut store = ObjectStore::new();
        let (mut builder, ins, root) = and_or_cone();
        let before = builder.make(&mut store);
        let rhs = factored(&mut store);
        let mapping = InOutMapping::new(ins.iter().map(|l| l.idx).collect(), root.idx);

        let effect = builder.evaluate_replace(&store, rhs, &mapping);
        assert_eq!(effect, Effect { size: -1, depth: 0 });

        builder.replace(&store, rhs, &mapping);
        assert_eq!(builder.cell_count(), 2);
        assert!(!builder.is_alive(3));
        assert!(!builder.is_alive(4));
        assert_eq!(builder.cell(root.idx).symbol, CellSymbol::And);

        let after = builder.make(&mut store);
        assert_eq!(
            evaluate(&store, store.subnet(before)),
            evaluate(&store, store.subnet(after))
        );
    }

    #[test]
    fn test_replace_with_inverted_output_becomes_buffer() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let nor = builder.add_cell(CellSymbol::And, &[!ins[0], !ins[1]]);
        let out = builder.add_cell(CellSymbol::Buf, &[nor]);
        builder.add_output(out);
        let before = builder.make(&mut store);

        let mut rhs = SubnetBuilder::new();
        let r = rhs.add_inputs(2);
        let or = rhs.add_cell(CellSymbol::Or, &[r[0], r[1]]);
        rhs.add_output(!or);
        let rhs = rhs.make(&mut store);

        let mapping = InOutMapping::new(vec![ins[0].idx, ins[1].idx], nor.idx);
        builder.replace(&store, rhs, &mapping);
        assert_eq!(builder.cell(nor.idx).symbol, CellSymbol::Buf);
        assert!(builder.cell(nor.idx).links[0].inv);

        let after = builder.make(&mut store);
        assert_eq!(
            evaluate(&store, store.subnet(before)),
            evaluate(&store, store.subnet(after))
        );
    }

    #[test]
    fn test_replace_keeps_shared_cone_cells() {
        let mut store = ObjectStore::new();
        let (mut builder, ins, root) = and_or_cone();
        // Keep a & b observable so it survives the replacement.
        let ab = builder.cell(root.idx).links[0];
        builder.add_output(ab);
        let rhs = factored(&mut store);
        let mapping = InOutMapping::new(ins.iter().map(|l| l.idx).collect(), root.idx);
        let effect = builder.evaluate_replace(&store, rhs, &mapping);
        builder.replace(&store, rhs, &mapping);
        assert!(builder.is_alive(ab.idx));
        assert_eq!(effect.size, 0);
        assert_eq!(builder.cell_count(), 3);
    }

    #[test]
    fn test_replace_splices_new_cells_without_strash_lookup() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::opt());
        let ins = builder.add_inputs(2);
        let ab = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        let x = builder.add_cell(CellSymbol::Xor, &[ins[0], ins[1]]);
        builder.add_output(ab);
        builder.add_output(x);

        // (a | b) & !(a & b): its AND is structurally equal to `ab`.
        let mut rhs = SubnetBuilder::new();
        let r = rhs.add_inputs(2);
        let t = rhs.add_cell(CellSymbol::And, &[r[0], r[1]]);
        let u = rhs.add_cell(CellSymbol::Or, &[r[0], r[1]]);
        let top = rhs.add_cell(CellSymbol::And, &[u, !t]);
        rhs.add_output(top);
        let rhs = rhs.make(&mut store);

        let mapping = InOutMapping::new(vec![ins[0].idx, ins[1].idx], x.idx);
        let effect = builder.evaluate_replace(&store, rhs, &mapping);
        assert_eq!(effect.size, 2);
        builder.replace(&store, rhs, &mapping);
        assert_eq!(builder.cell_count(), 4);
        assert_eq!(builder.refcount(ab.idx), 1);
        // The table still resolves to the cell that was there first.
        assert_eq!(builder.add_cell(CellSymbol::And, &[ins[1], ins[0]]), ab);
    }

    #[test]
    #[should_panic(expected = "leaves are bound")]
    fn test_replace_arity_mismatch_panics() {
        let mut store = ObjectStore::new();
        let (mut builder, ins, root) = and_or_cone();
        let rhs = factored(&mut store);
        let mapping = InOutMapping::new(vec![ins[0].idx, ins[1].idx], root.idx);
        builder.replace(&store, rhs, &mapping);
    }

    #[test]
    fn test_make_is_idempotent_and_drops_dead_cells() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let _unused = builder.add_cell(CellSymbol::Xor, &[ins[0], ins[1]]);
        let used = builder.add_cell(CellSymbol::And, &[ins[0], ins[1]]);
        builder.add_output(used);
        let a = builder.make(&mut store);
        let b = builder.make(&mut store);
        assert_eq!(store.subnet(a), store.subnet(b));
        assert_eq!(store.subnet(a).size(), 4);
    }

    #[test]
    fn test_from_subnet_preserves_indices() {
        let mut store = ObjectStore::new();
        let (builder, _, _) = and_or_cone();
        let id = builder.make(&mut store);
        let copy = SubnetBuilder::from_subnet(store.subnet(id));
        assert_eq!(copy.iter().collect::<Vec<_>>(), (0..7).collect::<Vec<_>>());
        assert_eq!(copy.make_subnet(), *store.subnet(id));
    }
}
