// SPDX-License-Identifier: Apache-2.0

//! Portable subnet representation and the binary encoding used for subnet
//! files and the NPN database.

use std::io;

use serde::{Deserialize, Serialize};

use crate::model::object::{CellTypeId, ObjectStore, SubnetId};
use crate::model::subnet::{Cell, Link, Subnet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializedEntry {
    /// Raw cell type handle. Built-in handles are identical across stores.
    pub cell_type: u64,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializedSubnet {
    pub in_num: u32,
    pub out_num: u32,
    pub entries: Vec<SerializedEntry>,
}

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Bincode(Box<bincode::ErrorKind>),
    Json(serde_json::Error),
    UnsupportedVersion { got: u32, want: u32 },
    UnknownCellType { raw: u64 },
    Malformed(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Bincode(e) => write!(f, "decode error: {}", e),
            LoadError::Json(e) => write!(f, "JSON error: {}", e),
            LoadError::UnsupportedVersion { got, want } => {
                write!(f, "unsupported format version {} (expected {})", got, want)
            }
            LoadError::UnknownCellType { raw } => {
                write!(f, "unknown cell type handle {:#x}", raw)
            }
            LoadError::Malformed(msg) => write!(f, "malformed data: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for LoadError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        Self::Bincode(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

pub fn serialize_subnet(subnet: &Subnet) -> SerializedSubnet {
    SerializedSubnet {
        in_num: subnet.in_num() as u32,
        out_num: subnet.out_num() as u32,
        entries: subnet
            .entries()
            .iter()
            .map(|cell| SerializedEntry {
                cell_type: cell.type_id.raw(),
                links: cell.links.clone(),
            })
            .collect(),
    }
}

/// Rebuilds a subnet against `store`. Nothing is allocated unless the data
/// passes validation.
pub fn restore_subnet(
    store: &mut ObjectStore,
    serialized: &SerializedSubnet,
) -> Result<SubnetId, LoadError> {
    let mut cells = Vec::with_capacity(serialized.entries.len());
    for (i, entry) in serialized.entries.iter().enumerate() {
        let type_id: CellTypeId = store
            .resolve_raw(entry.cell_type)
            .ok_or(LoadError::UnknownCellType {
                raw: entry.cell_type,
            })?;
        let cell_type = store.cell_type(type_id);
        if !cell_type.accepts_arity(entry.links.len()) {
            return Err(LoadError::Malformed(format!(
                "entry {} has {} links but {} takes {}..={}",
                i,
                entry.links.len(),
                store.string(cell_type.name),
                cell_type.in_min,
                cell_type.in_max
            )));
        }
        if let Some(link) = entry.links.iter().find(|l| l.idx as usize >= i) {
            return Err(LoadError::Malformed(format!(
                "entry {} links forward to entry {}",
                i, link.idx
            )));
        }
        cells.push(Cell {
            type_id,
            symbol: cell_type.symbol,
            links: entry.links.clone(),
        });
    }
    let subnet = Subnet::from_parts_unchecked(
        cells,
        serialized.in_num as usize,
        serialized.out_num as usize,
    );
    subnet.check_invariants().map_err(LoadError::Malformed)?;
    Ok(store.allocate(subnet))
}

pub fn write_subnet(w: impl io::Write, subnet: &Subnet) -> Result<(), LoadError> {
    bincode::serialize_into(w, &serialize_subnet(subnet))?;
    Ok(())
}

pub fn read_subnet(store: &mut ObjectStore, r: impl io::Read) -> Result<SubnetId, LoadError> {
    let serialized: SerializedSubnet = bincode::deserialize_from(r)?;
    restore_subnet(store, &serialized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builder::SubnetBuilder;
    use crate::model::celltype::CellSymbol;
    use pretty_assertions::assert_eq;

    fn sample(store: &mut ObjectStore) -> SubnetId {
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(3);
        let m = builder.add_cell(CellSymbol::Maj, &[ins[0], !ins[1], ins[2]]);
        let x = builder.add_cell(CellSymbol::Xnor, &[m, ins[0]]);
        builder.add_output(x);
        builder.add_output(!m);
        builder.make(store)
    }

    #[test]
    fn test_binary_round_trip_into_fresh_store() {
        let mut store = ObjectStore::new();
        let id = sample(&mut store);
        let mut bytes = Vec::new();
        write_subnet(&mut bytes, store.subnet(id)).unwrap();

        let mut other = ObjectStore::new();
        let restored = read_subnet(&mut other, bytes.as_slice()).unwrap();
        assert_eq!(other.subnet(restored), store.subnet(id));
    }

    #[test]
    fn test_unknown_cell_type_is_rejected() {
        let mut store = ObjectStore::new();
        let id = sample(&mut store);
        let mut serialized = serialize_subnet(store.subnet(id));
        serialized.entries[3].cell_type = store.cell_type_of(CellSymbol::And).raw() + 500;
        let err = restore_subnet(&mut store, &serialized).unwrap_err();
        assert!(matches!(err, LoadError::UnknownCellType { .. }), "{}", err);
    }

    #[test]
    fn test_forward_link_is_rejected() {
        let mut store = ObjectStore::new();
        let id = sample(&mut store);
        let mut serialized = serialize_subnet(store.subnet(id));
        serialized.entries[3].links[0] = Link::new(4);
        let before = store.len::<Subnet>();
        let err = restore_subnet(&mut store, &serialized).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(_)), "{}", err);
        assert_eq!(store.len::<Subnet>(), before);
    }
}
