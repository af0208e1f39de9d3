// SPDX-License-Identifier: Apache-2.0

pub mod rewriter;

pub use rewriter::{CutSource, RewriteError, RewriteOptions, RewriteStats, Rewriter};
