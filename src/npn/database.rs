// SPDX-License-Identifier: Apache-2.0

//! NPN-class-indexed store of known implementations.
//!
//! Every stored subnet realizes the canonical function of its class over the
//! canonical input order. A query function is canonicalized, and the stored
//! subnets are mapped back to the query through the inverse transform.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read};

use ahash::AHashMap;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::function::eval::evaluate;
use crate::function::truth_table::TruthTable;
use crate::model::object::{ObjectStore, SubnetId};
use crate::model::serdes::{LoadError, SerializedSubnet, restore_subnet, serialize_subnet};
use crate::model::subnet::Subnet;
use crate::npn::canon::{NpnTransform, apply_to_subnet, canonicalize};
use crate::synthesis::Resynthesizer;

const NPN_DB_VERSION: u32 = 1;

/// Canonical representatives of every NPN class of `num_vars`-input
/// functions, in ascending order.
pub fn enumerate_classes(num_vars: usize) -> Vec<TruthTable> {
    assert!(
        (1..=4).contains(&num_vars),
        "class enumeration supports 1 to 4 inputs, got {}",
        num_vars
    );
    let mut classes = BTreeSet::new();
    for bits in 0..1u64 << (1 << num_vars) {
        if let Some((canon, _)) = canonicalize(&TruthTable::from_u64(num_vars, bits)) {
            classes.insert(canon);
        }
    }
    classes.into_iter().collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpnDbOnDisk {
    pub version: u32,
    pub classes: Vec<(TruthTable, Vec<SerializedSubnet>)>,
}

/// Structural fingerprint of a subnet.
pub fn fingerprint(subnet: &Subnet) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(subnet.in_num() as u64).to_le_bytes());
    hasher.update(&(subnet.out_num() as u64).to_le_bytes());
    for cell in subnet.entries() {
        hasher.update(&cell.type_id.raw().to_le_bytes());
        hasher.update(&(cell.links.len() as u32).to_le_bytes());
        for link in &cell.links {
            hasher.update(&link.idx.to_le_bytes());
            hasher.update(&link.out.to_le_bytes());
            hasher.update(&[link.inv as u8]);
        }
    }
    *hasher.finalize().as_bytes()
}

/// Stored implementations of a query's NPN class.
#[derive(Debug, Clone)]
pub struct NpnMatch<'a> {
    pub subnets: &'a [SubnetId],
    /// Maps the canonical function back to the query.
    pub transform: NpnTransform,
}

impl NpnMatch<'_> {
    /// Builds a subnet computing the query function from the `i`-th stored
    /// implementation.
    pub fn realize(&self, store: &mut ObjectStore, i: usize) -> SubnetId {
        apply_to_subnet(store, self.subnets[i], &self.transform)
    }
}

#[derive(Debug, Default)]
pub struct NpnDatabase {
    classes: BTreeMap<TruthTable, Vec<SubnetId>>,
    fingerprints: AHashMap<[u8; 32], SubnetId>,
}

impl NpnDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn subnet_count(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn classes(&self) -> impl Iterator<Item = (&TruthTable, &[SubnetId])> {
        self.classes.iter().map(|(tt, ids)| (tt, ids.as_slice()))
    }

    /// Stores `subnet_id` in canonical form under its class and returns the
    /// stored id. A structurally identical canonical subnet already present
    /// is returned instead. `None` when the function has more than 6 inputs.
    pub fn push(&mut self, store: &mut ObjectStore, subnet_id: SubnetId) -> Option<SubnetId> {
        let subnet = store.subnet(subnet_id);
        assert_eq!(
            subnet.out_num(),
            1,
            "only single-output subnets can be stored"
        );
        let tt = evaluate(store, subnet).swap_remove(0);
        let (canon, xform) = canonicalize(&tt)?;
        let stored = apply_to_subnet(store, subnet_id, &xform);
        let key = fingerprint(store.subnet(stored));
        if let Some(existing) = self.fingerprints.get(&key) {
            log::trace!("npn_db: duplicate implementation of class {}", canon);
            return Some(*existing);
        }
        self.fingerprints.insert(key, stored);
        self.classes.entry(canon).or_default().push(stored);
        Some(stored)
    }

    /// Synthesizes every class over 1 to `max_vars` inputs with each of
    /// `resynthesizers` and stores the results. Returns the number of
    /// implementations that were new.
    pub fn populate(
        &mut self,
        store: &mut ObjectStore,
        max_vars: usize,
        resynthesizers: &[&dyn Resynthesizer],
    ) -> usize {
        let before = self.subnet_count();
        for num_vars in 1..=max_vars {
            let classes = enumerate_classes(num_vars);
            log::debug!("npn_db: vars={} classes={}", num_vars, classes.len());
            for canon in &classes {
                for resynthesizer in resynthesizers {
                    if let Some(id) = resynthesizer.resynthesize(store, canon, None, 2) {
                        self.push(store, id);
                    }
                }
            }
        }
        self.subnet_count() - before
    }

    pub fn get(&self, tt: &TruthTable) -> Option<NpnMatch<'_>> {
        let (canon, xform) = canonicalize(tt)?;
        let subnets = self.classes.get(&canon)?;
        Some(NpnMatch {
            subnets,
            transform: xform.inverse(),
        })
    }

    pub fn dump(&self, store: &ObjectStore, w: impl io::Write) -> Result<(), LoadError> {
        let on_disk = NpnDbOnDisk {
            version: NPN_DB_VERSION,
            classes: self
                .classes
                .iter()
                .map(|(tt, ids)| {
                    let subnets = ids
                        .iter()
                        .map(|id| serialize_subnet(store.subnet(*id)))
                        .collect();
                    (tt.clone(), subnets)
                })
                .collect(),
        };
        bincode::serialize_into(w, &on_disk)?;
        Ok(())
    }

    /// Reads a database written by [`NpnDatabase::dump`], optionally
    /// gzip-compressed.
    pub fn restore(store: &mut ObjectStore, mut r: impl io::Read) -> Result<Self, LoadError> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        if bytes.starts_with(&[0x1f, 0x8b]) {
            let mut inflated = Vec::new();
            GzDecoder::new(bytes.as_slice()).read_to_end(&mut inflated)?;
            bytes = inflated;
        }
        let on_disk: NpnDbOnDisk = bincode::deserialize(&bytes)?;
        if on_disk.version != NPN_DB_VERSION {
            return Err(LoadError::UnsupportedVersion {
                got: on_disk.version,
                want: NPN_DB_VERSION,
            });
        }
        let mut db = Self::new();
        for (tt, subnets) in on_disk.classes {
            let mut ids = Vec::with_capacity(subnets.len());
            for serialized in &subnets {
                let id = restore_subnet(store, serialized)?;
                db.fingerprints.insert(fingerprint(store.subnet(id)), id);
                ids.push(id);
            }
            db.classes.insert(tt, ids);
        }
        log::info!(
            "npn_db: restored classes={} subnets={}",
            db.len(),
            db.subnet_count()
        );
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builder::SubnetBuilder;
    use crate::model::celltype::CellSymbol;
    use pretty_assertions::assert_eq;

    fn and_not(store: &mut ObjectStore) -> SubnetId {
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(2);
        let g = builder.add_cell(CellSymbol::And, &[ins[0], !ins[1]]);
        builder.add_output(g);
        builder.make(store)
    }

    #[test]
    fn test_push_dedups_structural_duplicates() {
        let mut store = ObjectStore::new();
        let mut db = NpnDatabase::new();
        let a = and_not(&mut store);
        let b = and_not(&mut store);
        let first = db.push(&mut store, a).unwrap();
        let second = db.push(&mut store, b).unwrap();
        assert_eq!(first, second);
        assert_eq!(db.len(), 1);
        assert_eq!(db.subnet_count(), 1);
    }

    #[test]
    fn test_get_realizes_npn_equivalent_query() {
        let mut store = ObjectStore::new();
        let mut db = NpnDatabase::new();
        let id = and_not(&mut store);
        db.push(&mut store, id).unwrap();

        // NOR is NPN-equivalent to AND with a negated input.
        let a = TruthTable::var(2, 0);
        let b = TruthTable::var(2, 1);
        let query = a.or(&b).not();
        let found = db.get(&query).unwrap();
        assert_eq!(found.subnets.len(), 1);
        let realized = found.realize(&mut store, 0);
        assert_eq!(evaluate(&store, store.subnet(realized))[0], query);

        assert!(db.get(&a.xor(&b)).is_none());
    }

    #[test]
    fn test_class_counts() {
        assert_eq!(enumerate_classes(1).len(), 2);
        assert_eq!(enumerate_classes(2).len(), 4);
        assert_eq!(enumerate_classes(3).len(), 14);
    }

    #[test]
    fn test_populate_covers_every_three_input_function() {
        use crate::synthesis::{BiDecomposition, MinatoMorreale};
        let mut store = ObjectStore::new();
        let mut db = NpnDatabase::new();
        let added = db.populate(&mut store, 3, &[&MinatoMorreale, &BiDecomposition]);
        assert!(added >= 2 + 4 + 14);
        assert_eq!(db.len(), 2 + 4 + 14);
        for bits in [0x00u64, 0x96, 0xe8, 0x1b, 0xff] {
            let f = TruthTable::from_u64(3, bits);
            let found = db.get(&f).unwrap();
            let realized = found.realize(&mut store, 0);
            assert_eq!(evaluate(&store, store.subnet(realized))[0], f);
        }
    }

    #[test]
    fn test_restore_rejects_unknown_version() {
        let mut store = ObjectStore::new();
        let bytes = bincode::serialize(&NpnDbOnDisk {
            version: 99,
            classes: Vec::new(),
        })
        .unwrap();
        let err = NpnDatabase::restore(&mut store, bytes.as_slice()).unwrap_err();
        assert!(
            matches!(err, LoadError::UnsupportedVersion { got: 99, .. }),
            "{}",
            err
        );
    }
}
