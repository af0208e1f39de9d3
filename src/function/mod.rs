// SPDX-License-Identifier: Apache-2.0

pub mod eval;
pub mod isop;
pub mod truth_table;

pub use eval::{evaluate, evaluate_cone, evaluate_cut, simulate};
pub use isop::{Cube, isop};
pub use truth_table::TruthTable;
