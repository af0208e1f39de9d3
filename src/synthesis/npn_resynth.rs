// SPDX-License-Identifier: Apache-2.0

use crate::function::truth_table::TruthTable;
use crate::model::object::{ObjectStore, SubnetId};
use crate::model::subnet::Subnet;
use crate::npn::database::NpnDatabase;
use crate::synthesis::Resynthesizer;

/// Looks the function up in an NPN database and instantiates the cheapest
/// stored implementation of its class.
///
/// Don't-cares are not exploited: the lookup key is the function itself.
/// Stored implementations with a cell wider than `max_arity` are skipped.
pub struct NpnResynthesizer {
    db: NpnDatabase,
}

impl NpnResynthesizer {
    pub fn new(db: NpnDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &NpnDatabase {
        &self.db
    }
}

impl Resynthesizer for NpnResynthesizer {
    fn resynthesize(
        &self,
        store: &mut ObjectStore,
        func: &TruthTable,
        _care: Option<&TruthTable>,
        max_arity: u16,
    ) -> Option<SubnetId> {
        let found = self.db.get(func)?;
        let best = (0..found.subnets.len())
            .filter(|i| max_fanin(store.subnet(found.subnets[*i])) <= usize::from(max_arity))
            .min_by_key(|i| {
                let subnet = store.subnet(found.subnets[*i]);
                (subnet.cell_count(), subnet.path_length().1)
            })?;
        Some(found.realize(store, best))
    }

    fn name(&self) -> &'static str {
        "npn"
    }
}

fn max_fanin(subnet: &Subnet) -> usize {
    subnet
        .entries()
        .iter()
        .map(|cell| cell.links.len())
        .max()
        .unwrap_or(0)
}
