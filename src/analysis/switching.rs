// SPDX-License-Identifier: Apache-2.0

//! Per-entry switching activity of a subnet.
//!
//! Two estimators are provided: random simulation, which counts actual
//! toggles over a number of ticks, and a static propagation of signal
//! probabilities that assumes independent operands.

use std::time::Instant;

use bitvec::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::function::eval::simulate;
use crate::model::celltype::CellSymbol;
use crate::model::object::ObjectStore;
use crate::model::subnet::Subnet;

/// Activity of every entry of a subnet, indexed like its entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwitchActivity {
    /// Probability that the value changes between consecutive ticks.
    pub switching: Vec<f32>,
    /// Probability that the value is 1.
    pub on_state: Vec<f32>,
    /// 0-to-1 toggles; empty for static estimates.
    pub switches_on: Vec<u64>,
    /// 1-to-0 toggles; empty for static estimates.
    pub switches_off: Vec<u64>,
    /// Simulated ticks; 0 for static estimates.
    pub ticks: usize,
}

impl SwitchActivity {
    pub fn len(&self) -> usize {
        self.switching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switching.is_empty()
    }

    /// Sum of the switching probabilities of all entries.
    pub fn total_switching(&self) -> f64 {
        self.switching.iter().map(|p| f64::from(*p)).sum()
    }

    /// Per-tick rate of 0-to-1 toggles; the static estimate splits the
    /// switching probability evenly between both directions.
    pub fn rise_rate(&self, idx: usize) -> f32 {
        if self.ticks > 1 {
            self.switches_on[idx] as f32 / (self.ticks - 1) as f32
        } else {
            self.switching[idx] / 2.0
        }
    }

    /// Per-tick rate of 1-to-0 toggles.
    pub fn fall_rate(&self, idx: usize) -> f32 {
        if self.ticks > 1 {
            self.switches_off[idx] as f32 / (self.ticks - 1) as f32
        } else {
            self.switching[idx] / 2.0
        }
    }
}

pub trait ActivityEstimator {
    /// `input_probabilities[i]` is the probability that input `i` is 1; an
    /// empty slice means 0.5 for every input.
    fn estimate(
        &self,
        store: &ObjectStore,
        subnet: &Subnet,
        input_probabilities: &[f64],
    ) -> SwitchActivity;
}

fn input_probability(input_probabilities: &[f64], i: usize) -> f64 {
    if input_probabilities.is_empty() {
        0.5
    } else {
        input_probabilities[i]
    }
}

fn check_probabilities(subnet: &Subnet, input_probabilities: &[f64]) {
    assert!(
        input_probabilities.is_empty() || input_probabilities.len() == subnet.in_num(),
        "{} input probabilities given for {} inputs",
        input_probabilities.len(),
        subnet.in_num()
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationEstimator {
    pub ticks: usize,
    pub seed: u64,
}

impl Default for SimulationEstimator {
    fn default() -> Self {
        Self {
            ticks: 64 * 64,
            seed: 0,
        }
    }
}

impl SimulationEstimator {
    fn stimulus(&self, rng: &mut Xoshiro256PlusPlus, probability: f64, words: usize) -> Vec<u64> {
        (0..words)
            .map(|_| {
                if probability == 0.5 {
                    rng.r#gen::<u64>()
                } else {
                    (0..64).fold(0u64, |acc, bit| {
                        acc | (u64::from(rng.gen_bool(probability)) << bit)
                    })
                }
            })
            .collect()
    }
}

impl ActivityEstimator for SimulationEstimator {
    fn estimate(
        &self,
        store: &ObjectStore,
        subnet: &Subnet,
        input_probabilities: &[f64],
    ) -> SwitchActivity {
        assert!(self.ticks >= 2, "simulation needs at least two ticks");
        check_probabilities(subnet, input_probabilities);
        let t0 = Instant::now();
        let words = self.ticks.div_ceil(64);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let stimulus: Vec<Vec<u64>> = (0..subnet.in_num())
            .map(|i| self.stimulus(&mut rng, input_probability(input_probabilities, i), words))
            .collect();
        let values = simulate(store, subnet, &stimulus);

        let size = subnet.size();
        let mut switches_on = vec![0u64; size];
        let mut switches_off = vec![0u64; size];
        let mut ones = vec![0u64; size];
        let mut last: BitVec<u64, Lsb0> = bitvec![u64, Lsb0; 0; size];
        for w in 0..words {
            let valid_bits = (self.ticks - w * 64).min(64);
            let valid = if valid_bits == 64 {
                u64::MAX
            } else {
                (1u64 << valid_bits) - 1
            };
            for idx in 0..size {
                let word = values[idx][0][w] & valid;
                // Bit t of `prev` holds the value at tick t - 1.
                let prev = (word << 1) | u64::from(last[idx]);
                let mut changed_mask = valid;
                if w == 0 {
                    changed_mask &= !1;
                }
                switches_on[idx] += u64::from((!prev & word & changed_mask).count_ones());
                switches_off[idx] += u64::from((prev & !word & changed_mask).count_ones());
                ones[idx] += u64::from(word.count_ones());
                last.set(idx, (word >> (valid_bits - 1)) & 1 != 0);
            }
        }

        let transitions = (self.ticks - 1) as f32;
        let switching = (0..size)
            .map(|i| (switches_on[i] + switches_off[i]) as f32 / transitions)
            .collect();
        let on_state = ones
            .iter()
            .map(|n| *n as f32 / self.ticks as f32)
            .collect();
        log::debug!(
            "activity: simulated entries={} ticks={} elapsed_ms={}",
            size,
            self.ticks,
            t0.elapsed().as_millis()
        );
        SwitchActivity {
            switching,
            on_state,
            switches_on,
            switches_off,
            ticks: self.ticks,
        }
    }
}

/// Static estimate: on-state probabilities are propagated through the cells
/// as if all operands were independent, and the switching probability of a
/// signal with on-state probability `p` is `2p(1-p)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbabilityEstimator;

/// Distribution of the number of operands at 1.
fn ones_distribution(probs: &[f64]) -> Vec<f64> {
    let mut dist = vec![0.0; probs.len() + 1];
    dist[0] = 1.0;
    for (n, p) in probs.iter().enumerate() {
        for k in (0..=n + 1).rev() {
            let stay = dist[k] * (1.0 - p);
            let rise = if k > 0 { dist[k - 1] * p } else { 0.0 };
            dist[k] = stay + rise;
        }
    }
    dist
}

fn on_state_probabilities(store: &ObjectStore, subnet: &Subnet, input_probabilities: &[f64]) -> Vec<f64> {
    let mut probs = vec![0.0f64; subnet.size()];
    for (i, cell) in subnet.entries().iter().enumerate() {
        if cell.is_in() {
            probs[i] = input_probability(input_probabilities, i);
            continue;
        }
        let operands: Vec<f64> = cell
            .links
            .iter()
            .map(|l| {
                let p = probs[l.idx as usize];
                if l.inv { 1.0 - p } else { p }
            })
            .collect();
        let (symbol, inv) = cell.symbol.positive();
        let p: f64 = match symbol {
            CellSymbol::Zero => 0.0,
            CellSymbol::One => 1.0,
            CellSymbol::Buf | CellSymbol::Out => operands[0],
            CellSymbol::And => operands.iter().product(),
            CellSymbol::Or => 1.0 - operands.iter().map(|p| 1.0 - p).product::<f64>(),
            CellSymbol::Xor => ones_distribution(&operands).iter().skip(1).step_by(2).sum(),
            CellSymbol::Maj => ones_distribution(&operands)
                .iter()
                .skip(operands.len() / 2 + 1)
                .sum(),
            CellSymbol::Cell => {
                let cell_type = store.cell_type(cell.type_id);
                match cell_type.impl_subnet {
                    Some(impl_id) => {
                        let implementation = store.subnet(impl_id);
                        let inner = on_state_probabilities(store, implementation, &operands);
                        inner[implementation.outputs().start]
                    }
                    None => 0.5,
                }
            }
            CellSymbol::In | CellSymbol::Not | CellSymbol::Nand | CellSymbol::Nor | CellSymbol::Xnor => {
                unreachable!("inputs and negative symbols are handled above")
            }
        };
        probs[i] = if inv { 1.0 - p } else { p };
    }
    probs
}

impl ActivityEstimator for ProbabilityEstimator {
    fn estimate(
        &self,
        store: &ObjectStore,
        subnet: &Subnet,
        input_probabilities: &[f64],
    ) -> SwitchActivity {
        check_probabilities(subnet, input_probabilities);
        let probs = on_state_probabilities(store, subnet, input_probabilities);
        SwitchActivity {
            switching: probs.iter().map(|p| (2.0 * p * (1.0 - p)) as f32).collect(),
            on_state: probs.iter().map(|p| *p as f32).collect(),
            switches_on: Vec::new(),
            switches_off: Vec::new(),
            ticks: 0,
        }
    }
}
