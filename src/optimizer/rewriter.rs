// SPDX-License-Identifier: Apache-2.0

//! Cut-based local rewriting of a subnet builder.
//!
//! Every entry that exists when the pass starts is visited once in
//! topological order. Each of its cuts is evaluated and resynthesized, and
//! the candidate with the best predicted effect replaces the cone when that
//! effect is acceptable. Cuts come from a [`CutExtractor`] kept in step with
//! the builder; the reconvergence cut is available as an alternative source.

use std::fmt;
use std::time::Instant;

use ahash::AHashSet;
use serde::Serialize;

use crate::cut::Cut;
use crate::cut::extractor::{CutExtractor, CutOptions};
use crate::cut::reconvergence::reconvergence_cut;
use crate::function::eval::{evaluate_cone, evaluate_cut};
use crate::function::truth_table::TruthTable;
use crate::model::builder::{Effect, EntryId, InOutMapping, SubnetBuilder};
use crate::model::cursor::EntryCursor;
use crate::model::object::{ObjectStore, SubnetId};
use crate::synthesis::Resynthesizer;

/// Where the cuts tried at each entry come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CutSource {
    /// Every non-trivial cut a [`CutExtractor`] keeps for the entry.
    #[default]
    Enumerated,
    /// The single reconvergence-driven cut of the entry.
    Reconvergence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Leaf bound of the cuts taken at each entry.
    pub cut_size: usize,
    /// Caps the enumerated cuts per entry; `None` keeps all.
    pub max_cuts: Option<usize>,
    pub cut_source: CutSource,
    /// Fan-in bound passed to the resynthesizer.
    pub max_arity: u16,
    /// Also accept replacements that keep the cell count unchanged.
    pub zero_cost: bool,
    /// Reject replacements that deepen the rewritten entry.
    pub depth_aware: bool,
    /// Re-evaluate every applied replacement against the original cone.
    /// Always on in debug builds.
    pub validate: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            cut_size: 4,
            max_cuts: None,
            cut_source: CutSource::Enumerated,
            max_arity: 2,
            zero_cost: false,
            depth_aware: true,
            validate: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub visited: usize,
    /// Cuts for which the resynthesizer returned an implementation.
    pub resynthesized: usize,
    pub rewritten: usize,
    pub cells_before: usize,
    pub cells_after: usize,
    pub depth_before: u32,
    pub depth_after: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The replacement applied at `entry` does not compute the function of
    /// the cone it replaced.
    FunctionalMismatch { entry: EntryId },
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::FunctionalMismatch { entry } => write!(
                f,
                "rewrite of entry {} changed the function of its cone",
                entry
            ),
        }
    }
}

impl std::error::Error for RewriteError {}

pub struct Rewriter<'a> {
    resynthesizer: &'a dyn Resynthesizer,
    options: RewriteOptions,
}

impl<'a> Rewriter<'a> {
    pub fn new(resynthesizer: &'a dyn Resynthesizer, options: RewriteOptions) -> Self {
        assert!(options.cut_size >= 1, "cut size must be positive");
        Self {
            resynthesizer,
            options,
        }
    }

    pub fn options(&self) -> RewriteOptions {
        self.options
    }

    fn accepts(&self, size: i64, depth: i64) -> bool {
        let size_ok = size < 0 || (self.options.zero_cost && size == 0);
        let depth_ok = !self.options.depth_aware || depth <= 0;
        size_ok && depth_ok
    }

    /// Resynthesizes the cone of `cut` and predicts the effect of putting the
    /// result in its place.
    fn try_cut(
        &self,
        store: &mut ObjectStore,
        builder: &SubnetBuilder,
        cut: Cut,
    ) -> Option<Candidate> {
        let func = evaluate_cut(store, builder, &cut);
        let rhs = self
            .resynthesizer
            .resynthesize(store, &func, None, self.options.max_arity)?;
        let rhs_inputs = store.subnet(rhs).in_num();
        assert_eq!(
            rhs_inputs,
            cut.size(),
            "{} produced {} inputs for a cut of {} leaves",
            self.resynthesizer.name(),
            rhs_inputs,
            cut.size()
        );
        let mapping = InOutMapping::new(cut.leaves.clone(), cut.root);
        let effect = builder.evaluate_replace(store, rhs, &mapping);
        Some(Candidate {
            cut,
            func,
            rhs,
            effect,
        })
    }

    /// Runs one pass over `builder`.
    pub fn rewrite(
        &self,
        store: &mut ObjectStore,
        builder: &mut SubnetBuilder,
    ) -> Result<RewriteStats, RewriteError> {
        let t0 = Instant::now();
        let validate = self.options.validate || cfg!(debug_assertions);
        let mut stats = RewriteStats {
            cells_before: builder.cell_count(),
            depth_before: builder.max_depth(),
            ..RewriteStats::default()
        };

        let mut extractor = match self.options.cut_source {
            CutSource::Enumerated => Some(CutExtractor::with_options(
                &*builder,
                CutOptions {
                    cut_size: self.options.cut_size,
                    max_cuts: self.options.max_cuts,
                },
            )),
            CutSource::Reconvergence => None,
        };

        let mut cursor = EntryCursor::new(builder);
        while let Some(entry) = cursor.next(builder) {
            let cell = builder.cell(entry);
            if cell.is_in() || cell.is_out() || cell.is_const() {
                continue;
            }
            stats.visited += 1;

            let cuts: Vec<Cut> = match &extractor {
                Some(extractor) => extractor
                    .get_cuts(entry)
                    .iter()
                    .filter(|cut| !cut.is_trivial())
                    .cloned()
                    .collect(),
                None => vec![reconvergence_cut(&*builder, entry, self.options.cut_size)],
            };
            let mut best: Option<Candidate> = None;
            for cut in cuts {
                if cut.is_trivial() {
                    continue;
                }
                let Some(candidate) = self.try_cut(store, builder, cut) else {
                    continue;
                };
                stats.resynthesized += 1;
                let effect = candidate.effect;
                if !self.accepts(effect.size, effect.depth) {
                    continue;
                }
                if best.as_ref().is_none_or(|b| {
                    (effect.size, effect.depth) < (b.effect.size, b.effect.depth)
                }) {
                    best = Some(candidate);
                }
            }
            let Some(Candidate {
                cut,
                func,
                rhs,
                effect,
            }) = best
            else {
                continue;
            };

            log::trace!(
                "rewrite: entry={} cut={} size_delta={} depth_delta={}",
                entry,
                cut.size(),
                effect.size,
                effect.depth
            );
            let first_new = builder.max_id();
            builder.replace(store, rhs, &InOutMapping::new(cut.leaves.clone(), entry));
            stats.rewritten += 1;
            if let Some(extractor) = extractor.as_mut() {
                refresh_cuts(extractor, builder, entry, first_new);
            }

            if validate && evaluate_cone(store, &*builder, entry, &cut.leaves) != func {
                log::warn!("rewrite: entry={} functional mismatch after replace", entry);
                return Err(RewriteError::FunctionalMismatch { entry });
            }
        }

        stats.cells_after = builder.cell_count();
        stats.depth_after = builder.max_depth();
        log::info!(
            "rewrite: resynthesizer={} visited={} rewritten={} cells={}->{} depth={}->{} elapsed_ms={}",
            self.resynthesizer.name(),
            stats.visited,
            stats.rewritten,
            stats.cells_before,
            stats.cells_after,
            stats.depth_before,
            stats.depth_after,
            t0.elapsed().as_millis()
        );
        Ok(stats)
    }
}

struct Candidate {
    cut: Cut,
    func: TruthTable,
    rhs: SubnetId,
    effect: Effect,
}

/// Brings the cuts in line with a replacement at `root`: the cells spliced
/// in from `first_new` on, the root, then its transitive fanout in order.
fn refresh_cuts(
    extractor: &mut CutExtractor,
    builder: &SubnetBuilder,
    root: EntryId,
    first_new: usize,
) {
    for id in first_new..builder.max_id() {
        let id = id as EntryId;
        if builder.is_alive(id) {
            extractor.recompute(builder, id);
        }
    }
    extractor.recompute(builder, root);

    let mut stale: AHashSet<EntryId> = AHashSet::new();
    let mut stack: Vec<EntryId> = builder.fanouts(root).to_vec();
    while let Some(id) = stack.pop() {
        if stale.insert(id) {
            stack.extend_from_slice(builder.fanouts(id));
        }
    }
    let mut next = builder.next(root);
    while !stale.is_empty() {
        let Some(id) = next else {
            break;
        };
        if stale.remove(&id) {
            extractor.recompute(builder, id);
        }
        next = builder.next(id);
    }
}
