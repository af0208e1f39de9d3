// SPDX-License-Identifier: Apache-2.0

pub mod canon;
pub mod database;

pub use canon::{NpnTransform, apply_to_subnet, canonicalize, transform_tt};
pub use database::{NpnDatabase, NpnMatch, enumerate_classes};
