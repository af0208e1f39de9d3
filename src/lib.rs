// SPDX-License-Identifier: Apache-2.0

//! Combinational logic networks ("subnets") with cut-based resynthesis,
//! NPN-class databases and technology mapping onto cell libraries.

pub mod analysis;
pub mod cut;
pub mod function;
pub mod model;
pub mod npn;
pub mod optimizer;
pub mod synthesis;
pub mod techmap;

pub use model::{Link, ObjectStore, Subnet, SubnetBuilder, SubnetId};
