// SPDX-License-Identifier: Apache-2.0

//! Cut-based technology mapping onto a cell library.
//!
//! Mapping runs in four steps: cuts are enumerated for every entry, each
//! strategy picks a replacement per entry, the cover actually needed by the
//! outputs is selected backwards, and a new subnet of library cells is
//! built from that cover.

use std::fmt;
use std::time::Instant;

use ahash::AHashMap;
use serde::Serialize;

use crate::cut::extractor::{CutExtractor, CutOptions};
use crate::function::eval::evaluate_cut;
use crate::function::truth_table::TruthTable;
use crate::model::builder::{SubnetBuilder, SubnetBuilderOptions};
use crate::model::celltype::CellSymbol;
use crate::model::object::{ObjectStore, SubnetId};
use crate::model::subnet::{CellGraph, Link, Subnet};
use crate::techmap::genetic::GeneticOptions;
use crate::techmap::library::{CellMatch, Library};
use crate::techmap::{area, genetic, min_delay, power};

/// Slack below which two costs are considered equal.
pub(crate) const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapOptions {
    pub cut_size: usize,
    pub max_cuts: Option<usize>,
    /// Simulation length for the activity used by power-aware mapping.
    pub activity_ticks: usize,
    pub activity_seed: u64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            cut_size: 4,
            max_cuts: None,
            activity_ticks: 64 * 64,
            activity_seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    MinDelay,
    SimpleArea,
    AreaRecovery,
    PowerMap,
    Genetic(GeneticOptions),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::MinDelay => "min-delay",
            Strategy::SimpleArea => "simple-area",
            Strategy::AreaRecovery => "area-recovery",
            Strategy::PowerMap => "power-map",
            Strategy::Genetic(_) => "genetic",
        }
    }
}

/// How an entry of the source subnet is realized in the mapped one.
#[derive(Debug, Clone, PartialEq)]
pub enum BestReplacement {
    Input,
    Output { link: Link },
    Zero,
    One,
    /// The entry computes the value of one of its cut leaves.
    Wire { leaf: u32 },
    /// A library cell; pin `i` is driven by source entry `pins[i].idx`,
    /// through an inverter when `pins[i].inv`.
    Cell { cell: usize, pins: Vec<Link> },
}

impl BestReplacement {
    /// Source entries this replacement reads.
    pub fn leaves(&self) -> Vec<u32> {
        match self {
            BestReplacement::Input | BestReplacement::Zero | BestReplacement::One => Vec::new(),
            BestReplacement::Output { link } => vec![link.idx],
            BestReplacement::Wire { leaf } => vec![*leaf],
            BestReplacement::Cell { pins, .. } => pins.iter().map(|p| p.idx).collect(),
        }
    }
}

/// A replacement found for an entry and the index of the cut it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub cut: usize,
    pub replacement: BestReplacement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// No cut of a needed entry matches any library cell.
    NoAdmissibleCut { entry: u32 },
    /// An inverted output or pin needs an inverter the library lacks.
    MissingInverter { entry: u32 },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::NoAdmissibleCut { entry } => {
                write!(f, "no admissible cut for entry {}", entry)
            }
            MapError::MissingInverter { entry } => {
                write!(f, "entry {} needs an inverter but the library has none", entry)
            }
        }
    }
}

impl std::error::Error for MapError {}

/// Cuts, candidate replacements and fanout counts shared by all strategies.
pub struct MapContext<'a> {
    pub store: &'a ObjectStore,
    pub subnet: &'a Subnet,
    pub library: &'a Library,
    pub options: MapOptions,
    /// Candidates per entry; empty for inputs, outputs and constants.
    pub candidates: Vec<Vec<Candidate>>,
    pub fanout: Vec<u32>,
}

impl<'a> MapContext<'a> {
    pub fn new(
        store: &'a ObjectStore,
        subnet: &'a Subnet,
        library: &'a Library,
        options: MapOptions,
    ) -> Self {
        let t0 = Instant::now();
        let extractor = CutExtractor::with_options(
            subnet,
            CutOptions {
                cut_size: options.cut_size,
                max_cuts: options.max_cuts,
            },
        );
        let mut fanout = vec![0u32; subnet.size()];
        for cell in subnet.entries() {
            for link in &cell.links {
                fanout[link.idx as usize] += 1;
            }
        }

        let mut match_cache: AHashMap<TruthTable, Vec<CellMatch>> = AHashMap::new();
        let mut candidates = vec![Vec::new(); subnet.size()];
        let mut total = 0usize;
        for idx in 0..subnet.size() as u32 {
            let cell = subnet.cell(idx);
            if cell.is_in() || cell.is_out() || cell.is_const() {
                continue;
            }
            let mut found = Vec::new();
            for (cut_index, cut) in extractor.get_cuts(idx).iter().enumerate() {
                if cut.is_trivial() {
                    continue;
                }
                let func = evaluate_cut(store, subnet, cut);
                let support: Vec<usize> = (0..func.num_vars()).filter(|v| func.has_var(*v)).collect();
                let projected = func.project(&support);
                let leaf = |var: usize| cut.leaves[support[var]];
                if projected.is_zero() {
                    found.push(Candidate {
                        cut: cut_index,
                        replacement: BestReplacement::Zero,
                    });
                    continue;
                }
                if projected.is_one() {
                    found.push(Candidate {
                        cut: cut_index,
                        replacement: BestReplacement::One,
                    });
                    continue;
                }
                if projected == TruthTable::var(1, 0) {
                    found.push(Candidate {
                        cut: cut_index,
                        replacement: BestReplacement::Wire { leaf: leaf(0) },
                    });
                    continue;
                }
                let matches = match_cache
                    .entry(projected)
                    .or_insert_with_key(|f| library.matches(f));
                for m in matches.iter() {
                    let pins = m
                        .binding
                        .iter()
                        .map(|b| Link::new(leaf(b.leaf)).inverted_if(b.inv))
                        .collect();
                    found.push(Candidate {
                        cut: cut_index,
                        replacement: BestReplacement::Cell { cell: m.cell, pins },
                    });
                }
            }
            total += found.len();
            candidates[idx as usize] = found;
        }
        log::debug!(
            "techmap: candidates={} functions={} elapsed_ms={}",
            total,
            match_cache.len(),
            t0.elapsed().as_millis()
        );
        Self {
            store,
            subnet,
            library,
            options,
            candidates,
            fanout,
        }
    }

    /// Replacement of entries that are not mapped through cuts.
    pub fn fixed(&self, idx: u32) -> Option<BestReplacement> {
        let cell = self.subnet.cell(idx);
        match cell.symbol {
            CellSymbol::In => Some(BestReplacement::Input),
            CellSymbol::Out => Some(BestReplacement::Output {
                link: cell.links[0],
            }),
            CellSymbol::Zero => Some(BestReplacement::Zero),
            CellSymbol::One => Some(BestReplacement::One),
            _ => None,
        }
    }

    pub fn inverter_delay(&self) -> f32 {
        self.library
            .inverter()
            .map_or(0.0, |i| self.library.cell(i).max_delay())
    }

    pub fn inverter_area(&self) -> f32 {
        self.library
            .inverter()
            .map_or(0.0, |i| self.library.cell(i).area)
    }

    fn link_arrival(&self, link: Link, arrival: &[f32]) -> f32 {
        arrival[link.idx as usize] + if link.inv { self.inverter_delay() } else { 0.0 }
    }

    /// Arrival time at the output of `r` given the arrival of every source
    /// entry.
    pub fn arrival(&self, r: &BestReplacement, arrival: &[f32]) -> f32 {
        match r {
            BestReplacement::Input | BestReplacement::Zero | BestReplacement::One => 0.0,
            BestReplacement::Output { link } => self.link_arrival(*link, arrival),
            BestReplacement::Wire { leaf } => arrival[*leaf as usize],
            BestReplacement::Cell { cell, pins } => {
                let delays = &self.library.cell(*cell).delay;
                pins.iter()
                    .zip(delays)
                    .map(|(pin, delay)| self.link_arrival(*pin, arrival) + delay)
                    .fold(0.0, f32::max)
            }
        }
    }

    /// Area of the cell and of the inverters on its pins.
    pub fn area(&self, r: &BestReplacement) -> f32 {
        match r {
            BestReplacement::Cell { cell, pins } => {
                let inverters = pins.iter().filter(|p| p.inv).count() as f32;
                self.library.cell(*cell).area + inverters * self.inverter_area()
            }
            BestReplacement::Output { link } if link.inv => self.inverter_area(),
            _ => 0.0,
        }
    }

    fn shared(&self, idx: u32, flow: &[f32]) -> f32 {
        flow[idx as usize] / self.fanout[idx as usize].max(1) as f32
    }

    /// Area of `r` plus the area of its leaves' cones shared among their
    /// fanouts.
    pub fn area_flow(&self, r: &BestReplacement, flow: &[f32]) -> f32 {
        match r {
            BestReplacement::Input | BestReplacement::Zero | BestReplacement::One => 0.0,
            BestReplacement::Output { link } => flow[link.idx as usize] + self.area(r),
            BestReplacement::Wire { leaf } => self.shared(*leaf, flow),
            BestReplacement::Cell { pins, .. } => {
                self.area(r) + pins.iter().map(|p| self.shared(p.idx, flow)).sum::<f32>()
            }
        }
    }

    pub fn output_entries(&self) -> impl Iterator<Item = u32> + '_ {
        self.subnet.outputs().map(|i| i as u32)
    }
}

/// A replacement per entry together with the resulting arrival times.
#[derive(Debug, Clone)]
pub struct Selection {
    pub choice: Vec<Option<BestReplacement>>,
    pub arrival: Vec<f32>,
}

impl Selection {
    /// Worst arrival over the outputs.
    pub fn delay(&self, ctx: &MapContext) -> f32 {
        ctx.output_entries()
            .map(|o| self.arrival[o as usize])
            .fold(0.0, f32::max)
    }
}

/// Forward pass picking, for every entry, the first candidate minimal under
/// `better`. Entries without candidates get no replacement and an infinite
/// arrival.
pub(crate) fn forward_select<'c>(
    ctx: &'c MapContext,
    mut pick: impl FnMut(u32, &'c [Candidate], &[f32]) -> Option<&'c Candidate>,
) -> Selection {
    let size = ctx.subnet.size();
    let mut choice: Vec<Option<BestReplacement>> = vec![None; size];
    let mut arrival = vec![f32::INFINITY; size];
    for idx in 0..size as u32 {
        let replacement = match ctx.fixed(idx) {
            Some(r) => Some(r),
            None => pick(idx, &ctx.candidates[idx as usize], &arrival).map(|c| c.replacement.clone()),
        };
        if let Some(r) = &replacement {
            arrival[idx as usize] = ctx.arrival(r, &arrival);
        }
        choice[idx as usize] = replacement;
    }
    Selection { choice, arrival }
}

/// Required time per entry along the cover of `selection`, with the worst
/// output arrival as the target. Entries outside the cover stay unbounded.
pub(crate) fn required_times(ctx: &MapContext, selection: &Selection) -> Vec<f32> {
    let target = selection.delay(ctx);
    let mut required = vec![f32::INFINITY; ctx.subnet.size()];
    for idx in (0..ctx.subnet.size()).rev() {
        let r = match &selection.choice[idx] {
            Some(r) => r,
            None => continue,
        };
        let own = match r {
            BestReplacement::Output { .. } => target,
            _ => required[idx],
        };
        if !own.is_finite() {
            continue;
        }
        match r {
            BestReplacement::Output { link } => {
                let back = own - if link.inv { ctx.inverter_delay() } else { 0.0 };
                let slot = &mut required[link.idx as usize];
                *slot = slot.min(back);
            }
            BestReplacement::Wire { leaf } => {
                let slot = &mut required[*leaf as usize];
                *slot = slot.min(own);
            }
            BestReplacement::Cell { cell, pins } => {
                let delays = &ctx.library.cell(*cell).delay;
                for (pin, delay) in pins.iter().zip(delays) {
                    let inv = if pin.inv { ctx.inverter_delay() } else { 0.0 };
                    let slot = &mut required[pin.idx as usize];
                    *slot = slot.min(own - delay - inv);
                }
            }
            _ => {}
        }
    }
    required
}

/// Entries reachable from the outputs through the chosen replacements.
pub(crate) fn select_cover(subnet: &Subnet, choice: &[Option<BestReplacement>]) -> Result<Vec<bool>, MapError> {
    let mut used = vec![false; subnet.size()];
    let mut stack: Vec<u32> = subnet.outputs().map(|i| i as u32).collect();
    while let Some(idx) = stack.pop() {
        if used[idx as usize] {
            continue;
        }
        used[idx as usize] = true;
        let r = choice[idx as usize]
            .as_ref()
            .ok_or(MapError::NoAdmissibleCut { entry: idx })?;
        stack.extend(r.leaves());
    }
    Ok(used)
}

fn rebuild(
    store: &mut ObjectStore,
    subnet: &Subnet,
    library: &Library,
    choice: &[Option<BestReplacement>],
) -> Result<SubnetId, MapError> {
    let used = select_cover(subnet, choice)?;
    let mut builder = SubnetBuilder::with_options(SubnetBuilderOptions::no_opt());
    let mut mapped: Vec<Link> = vec![Link::default(); subnet.size()];
    let mut inverted: Vec<Option<Link>> = vec![None; subnet.size()];

    let mut signal = |builder: &mut SubnetBuilder, mapped: &[Link], link: Link, entry: u32| -> Result<Link, MapError> {
        if !link.inv {
            return Ok(mapped[link.idx as usize]);
        }
        if let Some(l) = inverted[link.idx as usize] {
            return Ok(l);
        }
        let inverter = library
            .inverter()
            .ok_or(MapError::MissingInverter { entry })?;
        let l = builder.add_cell_of_type(
            store,
            library.cell(inverter).type_id,
            &[mapped[link.idx as usize]],
        );
        inverted[link.idx as usize] = Some(l);
        Ok(l)
    };

    for idx in 0..subnet.size() as u32 {
        // Unused inputs are kept so the interface does not change.
        if !used[idx as usize] && !subnet.cell(idx).is_in() {
            continue;
        }
        let Some(r) = &choice[idx as usize] else {
            return Err(MapError::NoAdmissibleCut { entry: idx });
        };
        let link = match r {
            BestReplacement::Input => builder.add_input(),
            BestReplacement::Output { link } => {
                let driver = signal(&mut builder, &mapped[..], *link, idx)?;
                builder.add_output(driver);
                continue;
            }
            BestReplacement::Zero => builder.add_const(false),
            BestReplacement::One => builder.add_const(true),
            BestReplacement::Wire { leaf } => mapped[*leaf as usize],
            BestReplacement::Cell { cell, pins } => {
                let mut links = Vec::with_capacity(pins.len());
                for pin in pins {
                    links.push(signal(&mut builder, &mapped[..], *pin, idx)?);
                }
                builder.add_cell_of_type(store, library.cell(*cell).type_id, &links)
            }
        };
        mapped[idx as usize] = link;
    }
    Ok(builder.make(store))
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MapSummary {
    pub cells: usize,
    pub area: f32,
    pub delay: f32,
}

/// Cell count, total area and worst arrival of a mapped subnet, read from
/// the cell attributes registered in `store`.
pub fn summarize(store: &ObjectStore, subnet: &Subnet) -> MapSummary {
    let mut arrival = vec![0.0f32; subnet.size()];
    let mut summary = MapSummary::default();
    for (i, cell) in subnet.entries().iter().enumerate() {
        let attrs = store.cell_type(cell.type_id).attrs.as_ref();
        let at = cell
            .links
            .iter()
            .enumerate()
            .map(|(pin, l)| {
                let delay = attrs.and_then(|a| a.delay.get(pin)).copied().unwrap_or(0.0);
                arrival[l.idx as usize] + delay
            })
            .fold(0.0, f32::max);
        arrival[i] = at;
        if !cell.is_in() && !cell.is_out() {
            summary.cells += 1;
            summary.area += attrs.map_or(0.0, |a| a.area);
        }
    }
    summary.delay = subnet.outputs().map(|o| arrival[o]).fold(0.0, f32::max);
    summary
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mapper {
    options: MapOptions,
}

impl Mapper {
    pub fn new(options: MapOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> MapOptions {
        self.options
    }

    pub fn map(
        &self,
        store: &mut ObjectStore,
        subnet_id: SubnetId,
        library: &Library,
        strategy: &Strategy,
    ) -> Result<SubnetId, MapError> {
        let t0 = Instant::now();
        let subnet = store.subnet(subnet_id).clone();
        let choice = {
            let ctx = MapContext::new(store, &subnet, library, self.options);
            match strategy {
                Strategy::MinDelay => min_delay::select(&ctx).choice,
                Strategy::SimpleArea => area::select_simple(&ctx).choice,
                Strategy::AreaRecovery => area::select_recovery(&ctx).choice,
                Strategy::PowerMap => power::select(&ctx).choice,
                Strategy::Genetic(options) => genetic::select(&ctx, options).choice,
            }
        };
        let mapped = rebuild(store, &subnet, library, &choice)?;
        let summary = summarize(store, store.subnet(mapped));
        log::info!(
            "techmap: strategy={} cells={} area={:.3} delay={:.3} elapsed_ms={}",
            strategy.name(),
            summary.cells,
            summary.area,
            summary.delay,
            t0.elapsed().as_millis()
        );
        Ok(mapped)
    }
}
