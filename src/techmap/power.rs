// SPDX-License-Identifier: Apache-2.0

//! Power-aware selection.
//!
//! Required times come from the delay-optimal cover. Within each cut the
//! feasible cell with the lowest switching power is kept; across cuts the
//! candidate with the smallest area flow wins, with switch flow breaking
//! ties.

use crate::analysis::switching::{ActivityEstimator, SimulationEstimator, SwitchActivity};
use crate::techmap::area::{better, select_with_flow};
use crate::techmap::mapper::{
    BestReplacement, Candidate, EPS, MapContext, Selection, required_times,
};
use crate::techmap::min_delay;

/// Internal power of a cell: per pin, the rise energy times the pin's rise
/// rate plus the fall energy times its fall rate. Inverted pins swap the
/// rates.
pub fn cell_power(ctx: &MapContext, activity: &SwitchActivity, r: &BestReplacement) -> f32 {
    let BestReplacement::Cell { cell, pins } = r else {
        return 0.0;
    };
    let cell = ctx.library.cell(*cell);
    pins.iter()
        .enumerate()
        .map(|(i, pin)| {
            let (mut rise, mut fall) = (
                activity.rise_rate(pin.idx as usize),
                activity.fall_rate(pin.idx as usize),
            );
            if pin.inv {
                std::mem::swap(&mut rise, &mut fall);
            }
            let rise_energy = cell.rise_power.get(i).map_or(0.0, |p| p.abs());
            let fall_energy = cell.fall_power.get(i).map_or(0.0, |p| p.abs());
            rise_energy * rise + fall_energy * fall
        })
        .sum()
}

fn switch_flow(
    ctx: &MapContext,
    activity: &SwitchActivity,
    idx: u32,
    r: &BestReplacement,
    sflow: &[f32],
) -> f32 {
    let shared: f32 = r
        .leaves()
        .iter()
        .map(|leaf| sflow[*leaf as usize] / ctx.fanout[*leaf as usize].max(1) as f32)
        .sum();
    activity.switching[idx as usize] + shared
}

pub fn select(ctx: &MapContext) -> Selection {
    let activity = SimulationEstimator {
        ticks: ctx.options.activity_ticks,
        seed: ctx.options.activity_seed,
    }
    .estimate(ctx.store, ctx.subnet, &[]);
    let delay_optimal = min_delay::select(ctx);
    let required = required_times(ctx, &delay_optimal);
    let mut sflow: Vec<f32> = activity.switching.clone();

    select_with_flow(ctx, |idx, candidates, arrival, flow| {
        let deadline = required[idx as usize] + EPS;
        let mut per_cut: Vec<(&Candidate, f32)> = Vec::new();
        for candidate in candidates {
            if ctx.arrival(&candidate.replacement, arrival) > deadline {
                continue;
            }
            let power = cell_power(ctx, &activity, &candidate.replacement);
            match per_cut.last_mut() {
                Some((kept, kept_power)) if kept.cut == candidate.cut => {
                    if power < *kept_power - EPS {
                        *kept = candidate;
                        *kept_power = power;
                    }
                }
                _ => per_cut.push((candidate, power)),
            }
        }

        let mut best: Option<(&Candidate, (f32, f32))> = None;
        for (candidate, _) in per_cut {
            let cost = (
                ctx.area_flow(&candidate.replacement, flow),
                switch_flow(ctx, &activity, idx, &candidate.replacement, &sflow),
            );
            if best.is_none_or(|(_, b)| better(cost, b)) {
                best = Some((candidate, cost));
            }
        }
        let chosen = match best {
            Some((c, _)) => Some(c),
            None => candidates.iter().min_by(|a, b| {
                ctx.arrival(&a.replacement, arrival)
                    .total_cmp(&ctx.arrival(&b.replacement, arrival))
            }),
        };
        if let Some(c) = chosen {
            sflow[idx as usize] = switch_flow(ctx, &activity, idx, &c.replacement, &sflow);
        }
        chosen
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::ObjectStore;
    use crate::model::parser::parse_subnet;
    use crate::techmap::library::Library;
    use crate::techmap::mapper::{Mapper, MapOptions, Strategy};
    use pretty_assertions::assert_eq;

    const LIB: &str = r#"{ "cells": [
  { "name": "AND2_HP", "inputs": ["A", "B"], "truth_table": "8", "area": 3.0,
    "delay": [0.1, 0.1], "rise_power": [4.0, 4.0], "fall_power": [4.0, 4.0] },
  { "name": "AND2_LP", "inputs": ["A", "B"], "truth_table": "8", "area": 3.0,
    "delay": [0.1, 0.1], "rise_power": [1.0, 1.0], "fall_power": [1.0, 1.0] }
] }"#;

    fn mapped_cell_name(strategy: Strategy) -> String {
        let mut store = ObjectStore::new();
        let library = Library::from_json(&mut store, LIB.as_bytes()).unwrap();
        let id = parse_subnet(
            &mut store,
            "subnet {\n  %0 = in\n  %1 = in\n  %2 = and(%0, %1)\n  %3 = out(%2)\n}\n",
        )
        .unwrap();
        let mapped = Mapper::new(MapOptions::default())
            .map(&mut store, id, &library, &strategy)
            .unwrap();
        let subnet = store.subnet(mapped);
        assert_eq!(subnet.cell_count(), 1);
        store.cell_type_name(subnet.entries()[2].type_id).to_string()
    }

    #[test]
    fn test_power_picks_low_power_cell() {
        assert_eq!(mapped_cell_name(Strategy::SimpleArea), "AND2_HP");
        assert_eq!(mapped_cell_name(Strategy::PowerMap), "AND2_LP");
    }
}
