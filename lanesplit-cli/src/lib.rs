// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Split a test suite into balanced parallel lanes, using results from previous builds.
//!
//! This crate provides the `lanesplit` binary. The splitting itself lives in
//! [`lanesplit_runner`]; machine-readable output is described by [`lanesplit_metadata`].

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
