// SPDX-License-Identifier: Apache-2.0

use crate::techmap::mapper::{MapContext, Selection, forward_select};

/// Delay-optimal selection: every entry takes the candidate with the
/// earliest arrival; the first one found wins ties.
pub fn select(ctx: &MapContext) -> Selection {
    forward_select(ctx, |_, candidates, arrival| {
        let mut best = None;
        let mut best_arrival = f32::INFINITY;
        for candidate in candidates {
            let at = ctx.arrival(&candidate.replacement, arrival);
            if at < best_arrival {
                best_arrival = at;
                best = Some(candidate);
            }
        }
        best
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::ObjectStore;
    use crate::model::parser::parse_subnet;
    use crate::techmap::library::tests::sample_library;
    use crate::techmap::mapper::tests::ADDER;
    use crate::techmap::mapper::{MapOptions, select_cover};

    #[test]
    fn test_choice_is_locally_optimal() {
        let mut store = ObjectStore::new();
        let library = sample_library(&mut store);
        let id = parse_subnet(&mut store, ADDER).unwrap();
        let subnet = store.subnet(id);
        let ctx = MapContext::new(&store, subnet, &library, MapOptions::default());
        let selection = select(&ctx);
        let used = select_cover(subnet, &selection.choice).unwrap();
        for (idx, candidates) in ctx.candidates.iter().enumerate() {
            if !used[idx] || candidates.is_empty() {
                continue;
            }
            let chosen = selection.arrival[idx];
            for candidate in candidates {
                assert!(chosen <= ctx.arrival(&candidate.replacement, &selection.arrival));
            }
        }
        // The carry is realized by MAJ3 directly on the inputs.
        assert!((selection.arrival[7] - 0.12).abs() < 1e-6);
    }
}
