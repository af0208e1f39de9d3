// SPDX-License-Identifier: Apache-2.0

//! Technology mapping onto a cell library.

pub mod area;
pub mod genetic;
pub mod library;
pub mod mapper;
pub mod min_delay;
pub mod power;

pub use genetic::GeneticOptions;
pub use library::{CellDesc, Library, LibraryCell, LibraryDesc};
pub use mapper::{MapError, MapOptions, MapSummary, Mapper, Strategy, summarize};
