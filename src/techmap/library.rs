// SPDX-License-Identifier: Apache-2.0

//! Standard-cell library: JSON loading and functional matching.

use std::collections::BTreeMap;
use std::io::{self, Read};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::function::truth_table::TruthTable;
use crate::model::celltype::CellAttrs;
use crate::model::object::{CellTypeId, ObjectStore, SubnetId};
use crate::model::serdes::LoadError;
use crate::npn::canon::{MAX_NPN_VARS, NpnTransform, canonicalize, next_permutation, transform_tt};
use crate::synthesis::{MinatoMorreale, Resynthesizer};

/// On-disk description of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDesc {
    pub name: String,
    pub inputs: Vec<String>,
    /// Hex over the inputs, most significant digit first; input 0 is the
    /// least significant variable.
    pub truth_table: String,
    pub area: f32,
    pub delay: Vec<f32>,
    #[serde(default)]
    pub rise_power: Vec<f32>,
    #[serde(default)]
    pub fall_power: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LibraryDesc {
    pub cells: Vec<CellDesc>,
}

#[derive(Debug, Clone)]
pub struct LibraryCell {
    pub name: String,
    pub type_id: CellTypeId,
    pub impl_subnet: SubnetId,
    pub truth_table: TruthTable,
    pub area: f32,
    pub delay: Vec<f32>,
    pub rise_power: Vec<f32>,
    pub fall_power: Vec<f32>,
}

impl LibraryCell {
    pub fn num_inputs(&self) -> usize {
        self.truth_table.num_vars()
    }

    pub fn max_delay(&self) -> f32 {
        self.delay.iter().copied().fold(0.0, f32::max)
    }
}

/// Source of the signal on one cell pin: a leaf position of the matched
/// cut, possibly through an inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinBinding {
    pub leaf: usize,
    pub inv: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMatch {
    /// Index into [`Library::cells`].
    pub cell: usize,
    /// One binding per cell pin.
    pub binding: Vec<PinBinding>,
}

impl CellMatch {
    pub fn inversions(&self) -> usize {
        self.binding.iter().filter(|b| b.inv).count()
    }
}

#[derive(Debug, Default)]
pub struct Library {
    cells: Vec<LibraryCell>,
    by_class: BTreeMap<TruthTable, Vec<usize>>,
    inverter: Option<usize>,
}

/// Input-negation masks over `num_vars` variables, fewest negations first.
fn masks_by_weight(num_vars: usize) -> Vec<u32> {
    let mut masks: Vec<u32> = (0..(1u32 << num_vars)).collect();
    masks.sort_by_key(|m| (m.count_ones(), *m));
    masks
}

/// Permutation and input negations taking `cell` to `func`, with as few
/// negations as possible. Output negation is never used.
fn find_binding(cell: &TruthTable, func: &TruthTable) -> Option<Vec<PinBinding>> {
    let num_vars = func.num_vars();
    for mask in masks_by_weight(num_vars) {
        let mut perm: Vec<u8> = (0..num_vars as u8).collect();
        loop {
            let xform = NpnTransform {
                perm: perm.clone(),
                input_neg_mask: mask,
                output_neg: false,
            };
            if transform_tt(cell, &xform) == *func {
                let mut binding = vec![PinBinding { leaf: 0, inv: false }; num_vars];
                for (i, p) in perm.iter().enumerate() {
                    binding[*p as usize] = PinBinding {
                        leaf: i,
                        inv: xform.input_negated(i),
                    };
                }
                return Some(binding);
            }
            if !next_permutation(&mut perm) {
                break;
            }
        }
    }
    None
}

impl Library {
    /// Reads a JSON library, optionally gzip-compressed, and registers every
    /// cell as a composite type of `store`.
    pub fn from_json(store: &mut ObjectStore, mut r: impl io::Read) -> Result<Self, LoadError> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        if bytes.starts_with(&[0x1f, 0x8b]) {
            let mut inflated = Vec::new();
            GzDecoder::new(bytes.as_slice()).read_to_end(&mut inflated)?;
            bytes = inflated;
        }
        let desc: LibraryDesc = serde_json::from_slice(&bytes)?;
        Self::from_desc(store, &desc)
    }

    pub fn from_desc(store: &mut ObjectStore, desc: &LibraryDesc) -> Result<Self, LoadError> {
        let mut library = Library::default();
        for cell in &desc.cells {
            library.add_cell(store, cell)?;
        }
        log::info!(
            "library: cells={} classes={} inverter={}",
            library.cells.len(),
            library.by_class.len(),
            library
                .inverter
                .map_or("none", |i| library.cells[i].name.as_str())
        );
        Ok(library)
    }

    fn add_cell(&mut self, store: &mut ObjectStore, desc: &CellDesc) -> Result<(), LoadError> {
        let num_inputs = desc.inputs.len();
        let malformed = |what: String| LoadError::Malformed(format!("cell '{}': {}", desc.name, what));
        if num_inputs > MAX_NPN_VARS {
            return Err(malformed(format!(
                "{} inputs exceed the supported {}",
                num_inputs, MAX_NPN_VARS
            )));
        }
        let truth_table = TruthTable::from_hex(num_inputs, &desc.truth_table)
            .ok_or_else(|| malformed(format!("bad truth table '{}'", desc.truth_table)))?;
        for (what, values) in [
            ("delay", &desc.delay),
            ("rise_power", &desc.rise_power),
            ("fall_power", &desc.fall_power),
        ] {
            if what != "delay" && values.is_empty() {
                continue;
            }
            if values.len() != num_inputs {
                return Err(malformed(format!(
                    "{} has {} entries for {} inputs",
                    what,
                    values.len(),
                    num_inputs
                )));
            }
        }
        if store.find_cell_type(&desc.name).is_some() {
            return Err(malformed("name is already registered".to_string()));
        }

        let impl_subnet = MinatoMorreale
            .resynthesize(store, &truth_table, None, u16::MAX)
            .ok_or_else(|| malformed("cannot synthesize an implementation".to_string()))?;
        let attrs = CellAttrs {
            area: desc.area,
            delay: desc.delay.clone(),
            rise_power: desc.rise_power.clone(),
            fall_power: desc.fall_power.clone(),
        };
        let type_id = store.register_composite(&desc.name, impl_subnet, Some(attrs));

        let index = self.cells.len();
        if num_inputs == 1 && truth_table.as_u64() == 0b01 {
            let cheaper = self
                .inverter
                .is_none_or(|i| desc.area < self.cells[i].area);
            if cheaper {
                self.inverter = Some(index);
            }
        }
        if let Some((canon, _)) = canonicalize(&truth_table) {
            self.by_class.entry(canon).or_default().push(index);
        }
        self.cells.push(LibraryCell {
            name: desc.name.clone(),
            type_id,
            impl_subnet,
            truth_table,
            area: desc.area,
            delay: desc.delay.clone(),
            rise_power: desc.rise_power.clone(),
            fall_power: desc.fall_power.clone(),
        });
        Ok(())
    }

    pub fn cells(&self) -> &[LibraryCell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> &LibraryCell {
        &self.cells[index]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cheapest single-input cell computing the complement of its input.
    pub fn inverter(&self) -> Option<usize> {
        self.inverter
    }

    /// Cells that implement `func` with their pins bound to its variables.
    /// Matches needing an inverted pin are only returned when the library
    /// has an inverter to realize it.
    pub fn matches(&self, func: &TruthTable) -> Vec<CellMatch> {
        let Some((canon, _)) = canonicalize(func) else {
            return Vec::new();
        };
        let Some(candidates) = self.by_class.get(&canon) else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter_map(|index| {
                let binding = find_binding(&self.cells[*index].truth_table, func)?;
                let found = CellMatch {
                    cell: *index,
                    binding,
                };
                (found.inversions() == 0 || self.inverter.is_some()).then_some(found)
            })
            .collect()
    }
}
