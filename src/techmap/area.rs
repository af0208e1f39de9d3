// SPDX-License-Identifier: Apache-2.0

//! Area-oriented selection by area flow, with optional delay recovery.

use crate::techmap::mapper::{
    Candidate, EPS, MapContext, Selection, forward_select, required_times,
};
use crate::techmap::min_delay;

/// Lexicographic comparison of `(primary, secondary)` costs with tolerance.
pub(crate) fn better(a: (f32, f32), b: (f32, f32)) -> bool {
    a.0 < b.0 - EPS || ((a.0 - b.0).abs() <= EPS && a.1 < b.1 - EPS)
}

/// Runs `pick` with the area flow of every entry selected so far.
pub(crate) fn select_with_flow<'c>(
    ctx: &'c MapContext,
    mut pick: impl FnMut(u32, &'c [Candidate], &[f32], &[f32]) -> Option<&'c Candidate>,
) -> Selection {
    let mut flow = vec![0.0f32; ctx.subnet.size()];
    forward_select(ctx, |idx, candidates, arrival| {
        let chosen = pick(idx, candidates, arrival, &flow);
        if let Some(c) = chosen {
            flow[idx as usize] = ctx.area_flow(&c.replacement, &flow);
        }
        chosen
    })
}

/// Minimum area flow; ties go to the earlier arrival.
pub fn select_simple(ctx: &MapContext) -> Selection {
    select_with_flow(ctx, |_, candidates, arrival, flow| {
        let mut best: Option<(&Candidate, (f32, f32))> = None;
        for candidate in candidates {
            let cost = (
                ctx.area_flow(&candidate.replacement, flow),
                ctx.arrival(&candidate.replacement, arrival),
            );
            if best.is_none_or(|(_, b)| better(cost, b)) {
                best = Some((candidate, cost));
            }
        }
        best.map(|(c, _)| c)
    })
}

/// Minimum area flow among candidates meeting the required times of the
/// delay-optimal cover.
pub fn select_recovery(ctx: &MapContext) -> Selection {
    let delay_optimal = min_delay::select(ctx);
    let required = required_times(ctx, &delay_optimal);
    log::debug!(
        "techmap: area recovery target delay={:.3}",
        delay_optimal.delay(ctx)
    );
    select_with_flow(ctx, |idx, candidates, arrival, flow| {
        pick_within_required(ctx, candidates, arrival, required[idx as usize], |c| {
            ctx.area_flow(&c.replacement, flow)
        })
    })
}

/// Candidate minimizing `(cost, arrival)` among those arriving by
/// `required`; the earliest arrival when none does.
pub(crate) fn pick_within_required<'c>(
    ctx: &MapContext,
    candidates: &'c [Candidate],
    arrival: &[f32],
    required: f32,
    cost: impl Fn(&Candidate) -> f32,
) -> Option<&'c Candidate> {
    let mut best: Option<(&Candidate, (f32, f32))> = None;
    let mut earliest: Option<(&Candidate, f32)> = None;
    for candidate in candidates {
        let at = ctx.arrival(&candidate.replacement, arrival);
        if earliest.is_none_or(|(_, e)| at < e) {
            earliest = Some((candidate, at));
        }
        if at > required + EPS {
            continue;
        }
        let key = (cost(candidate), at);
        if best.is_none_or(|(_, b)| better(key, b)) {
            best = Some((candidate, key));
        }
    }
    best.map(|(c, _)| c).or(earliest.map(|(c, _)| c))
}
