// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Hierarchical test results, as recorded by a previous test run.
//!
//! A [`ResultTree`] groups test cases into classes, and classes into packages. Trees are usually
//! read from JUnit/XUnit XML with [`read_junit_cases`].

mod errors;
mod read;
mod tree;

pub use errors::*;
pub use read::*;
pub use tree::*;
