// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [lanesplit](https://github.com/lanesplit/lanesplit), a tool that splits
//! a test suite into lanes of roughly equal duration.
//!
//! The main entry point is [`splitter::TestSplitter`]. It looks for test results from a previous
//! build (see [`history`]), flattens them into test entities at a configurable
//! [granularity](granularity::GranularityMode), partitions the entities into lanes, and produces an
//! inclusion or exclusion list for each lane. The lists can then be persisted with a
//! [`sink::SplitSink`].
//!
//! For the filesystem-backed build history used by the `lanesplit` command-line tool, see
//! [`history::BuildHistoryStore`].

pub mod config;
pub mod entity;
pub mod errors;
pub mod estimate;
pub mod granularity;
pub mod history;
pub mod output_format;
pub mod parallelism;
pub mod partition;
pub mod patterns;
pub mod sink;
pub mod splitter;
#[cfg(test)]
mod test_helpers;
