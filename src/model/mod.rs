// SPDX-License-Identifier: Apache-2.0

pub mod builder;
pub mod celltype;
pub mod cursor;
pub mod object;
pub mod parser;
pub mod serdes;
pub mod subnet;

pub use builder::{Effect, EntryId, InOutMapping, SubnetBuilder, SubnetBuilderOptions};
pub use celltype::{CellAttrs, CellSymbol, CellType};
pub use cursor::EntryCursor;
pub use object::{CellTypeId, ObjectStore, StringId, SubnetId};
pub use subnet::{Cell, CellGraph, Link, Subnet};
