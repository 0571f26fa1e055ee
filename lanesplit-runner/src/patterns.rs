// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inclusion and exclusion lists for each lane.

use crate::partition::Partition;
use lanesplit_metadata::LaneKind;

/// The tests a single lane should run, as a list of patterns.
///
/// If [`includes`](Self::includes) is true, the lane runs exactly the listed tests. Otherwise the
/// lane runs everything except the listed tests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InclusionExclusionPattern {
    includes: bool,
    patterns: Vec<String>,
}

impl InclusionExclusionPattern {
    /// Creates a new pattern list.
    pub fn new(includes: bool, patterns: Vec<String>) -> Self {
        Self { includes, patterns }
    }

    /// Returns a single exclusion list that excludes nothing, i.e. a lane that runs everything.
    pub fn run_everything() -> Self {
        Self::new(false, Vec::new())
    }

    /// Returns true if the patterns list the tests to run, false if they list the tests to skip.
    pub fn includes(&self) -> bool {
        self.includes
    }

    /// Returns the kind of this pattern list.
    pub fn kind(&self) -> LaneKind {
        if self.includes {
            LaneKind::Include
        } else {
            LaneKind::Exclude
        }
    }

    /// Returns the patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the name of the file this lane's patterns are written to, e.g.
    /// `split.3.include.txt`.
    pub fn file_name(&self, lane: usize) -> String {
        format!("split.{lane}.{}.txt", self.kind().as_str())
    }
}

/// Generates one pattern list per lane, in lane order.
///
/// Without inclusions, every lane excludes the tests assigned to all other lanes. With inclusions,
/// lane 0 still excludes everything assigned elsewhere, and each other lane includes exactly its
/// own tests. Lane 0 thus also picks up any tests that didn't exist when the partition was made.
///
/// Patterns are listed heaviest entity first.
pub fn generate(partition: &Partition, generate_inclusions: bool) -> Vec<InclusionExclusionPattern> {
    (0..partition.lane_count())
        .map(|lane| {
            let includes = generate_inclusions && lane != 0;
            let patterns = partition
                .entities()
                .iter()
                .filter(|entity| includes == (partition.lane_of(entity.key()) == Some(lane)))
                .flat_map(|entity| entity.elements())
                .collect();
            InclusionExclusionPattern::new(includes, patterns)
        })
        .collect()
}
