// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable output for [lanesplit](https://github.com/lanesplit/lanesplit).
//!
//! `lanesplit split --message-format json` prints a [`SplitPlanSummary`]. Exit codes for expected
//! failures are documented in [`LaneSplitExitCode`].

mod exit_codes;
mod plan;

pub use exit_codes::*;
pub use plan::*;
