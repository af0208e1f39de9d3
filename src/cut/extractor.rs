// SPDX-License-Identifier: Apache-2.0

//! Bounded cut enumeration for every entry of a subnet or builder.

use std::time::Instant;

use crate::cut::Cut;
use crate::model::subnet::CellGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutOptions {
    /// Maximum number of leaves per cut.
    pub cut_size: usize,
    /// Keeps at most this many non-trivial cuts per entry, in the order they
    /// were found. `None` keeps all.
    pub max_cuts: Option<usize>,
}

impl Default for CutOptions {
    fn default() -> Self {
        Self {
            cut_size: 4,
            max_cuts: None,
        }
    }
}

pub struct CutExtractor {
    cuts: Vec<Vec<Cut>>,
    options: CutOptions,
}

impl CutExtractor {
    pub fn new<V: CellGraph>(view: &V, cut_size: usize) -> Self {
        Self::with_options(
            view,
            CutOptions {
                cut_size,
                ..CutOptions::default()
            },
        )
    }

    pub fn with_options<V: CellGraph>(view: &V, options: CutOptions) -> Self {
        assert!(options.cut_size >= 1, "cut size must be positive");
        let t0 = Instant::now();
        let mut extractor = Self {
            cuts: vec![Vec::new(); view.max_idx()],
            options,
        };
        let mut total_cuts = 0usize;
        for idx in view.order() {
            let cuts = extractor.compute(view, idx);
            total_cuts += cuts.len();
            extractor.cuts[idx as usize] = cuts;
        }
        log::debug!(
            "cut_extractor: entries={} cut_size={} total_cuts={} elapsed_ms={}",
            view.max_idx(),
            options.cut_size,
            total_cuts,
            t0.elapsed().as_millis()
        );
        extractor
    }

    pub fn options(&self) -> CutOptions {
        self.options
    }

    /// Cuts rooted at `idx`; the trivial cut comes first.
    pub fn get_cuts(&self, idx: u32) -> &[Cut] {
        &self.cuts[idx as usize]
    }

    /// Recomputes the cuts of one entry from its drivers' current cuts.
    pub fn recompute<V: CellGraph>(&mut self, view: &V, idx: u32) {
        if self.cuts.len() < view.max_idx() {
            self.cuts.resize(view.max_idx(), Vec::new());
        }
        let cuts = self.compute(view, idx);
        self.cuts[idx as usize] = cuts;
    }

    fn compute<V: CellGraph>(&self, view: &V, idx: u32) -> Vec<Cut> {
        let cell = view.cell(idx);
        let trivial = Cut::trivial(idx);
        if cell.is_in() || cell.is_const() || cell.is_out() {
            return vec![trivial];
        }

        // Cross product of driver cuts, one driver at a time.
        let mut partial: Vec<Vec<u32>> = vec![Vec::new()];
        for link in &cell.links {
            let driver_cuts = &self.cuts[link.idx as usize];
            let mut next: Vec<Vec<u32>> = Vec::new();
            for leaves in &partial {
                for driver_cut in driver_cuts {
                    let mut union = leaves.clone();
                    for leaf in &driver_cut.leaves {
                        if let Err(pos) = union.binary_search(leaf) {
                            union.insert(pos, *leaf);
                        }
                    }
                    if union.len() <= self.options.cut_size && !next.contains(&union) {
                        next.push(union);
                    }
                }
            }
            partial = next;
        }

        let candidates: Vec<Cut> = partial
            .into_iter()
            .filter(|leaves| !leaves.is_empty())
            .map(|leaves| Cut::new(idx, leaves))
            .collect();
        let mut cuts = vec![trivial];
        for (i, cut) in candidates.iter().enumerate() {
            let dominated = candidates
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && other.size() < cut.size() && other.is_subset_of(cut));
            if dominated {
                continue;
            }
            if let Some(max) = self.options.max_cuts {
                if cuts.len() > max {
                    break;
                }
            }
            cuts.push(cut.clone());
        }
        cuts
    }
}
