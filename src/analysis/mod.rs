// SPDX-License-Identifier: Apache-2.0

//! Switching-activity estimation and reporting.

pub mod report;
pub mod switching;

pub use report::write_report;
pub use switching::{ActivityEstimator, ProbabilityEstimator, SimulationEstimator, SwitchActivity};
