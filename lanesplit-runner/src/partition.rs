// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partitioning test entities into lanes of roughly equal duration.
//!
//! Entities are placed heaviest-first into whichever lane currently has the smallest total
//! (longest-processing-time-first scheduling). This doesn't find an optimal partition, but the
//! heaviest lane is within a third of the optimum, and the result is fully deterministic for a
//! given input.

use crate::entity::{TestEntity, TestEntityMap};
use indexmap::{IndexMap, map::Entry};
use lanesplit_metadata::PartitionStatsSummary;
use std::{cmp::Reverse, collections::BinaryHeap, fmt};

/// An assignment of test entities to lanes.
#[derive(Clone, Debug)]
pub struct Partition {
    // Sorted by descending duration.
    entities: Vec<TestEntity>,
    lane_totals: Vec<u64>,
    assignment: IndexMap<String, usize>,
}

impl Partition {
    /// Partitions `entities` into `lane_count` lanes.
    ///
    /// Entities with equal durations are placed in key order, and lanes with equal totals are
    /// filled in index order.
    ///
    /// # Panics
    ///
    /// Panics if `lane_count` is 0.
    pub fn compute(entities: TestEntityMap, lane_count: usize) -> Self {
        assert!(lane_count > 0, "partition requires at least one lane");

        // The map is ordered by key and the sort is stable, so ties keep key order.
        let mut entities: Vec<TestEntity> = entities.into_iter().collect();
        entities.sort_by_key(|entity| Reverse(entity.duration_ms()));

        let mut lane_totals = vec![0u64; lane_count];
        let mut lightest: BinaryHeap<Reverse<(u64, usize)>> =
            (0..lane_count).map(|lane| Reverse((0, lane))).collect();
        let mut assignment = IndexMap::with_capacity(entities.len());

        for entity in &entities {
            let Reverse((total, lane)) = lightest
                .pop()
                .expect("heap always contains lane_count > 0 lanes");
            match assignment.entry(entity.key().to_owned()) {
                Entry::Vacant(entry) => {
                    entry.insert(lane);
                }
                Entry::Occupied(entry) => {
                    panic!(
                        "entity `{}` assigned to lane {lane}, but already assigned to lane {}",
                        entry.key(),
                        entry.get()
                    );
                }
            }
            let total = total.saturating_add(entity.duration_ms());
            lane_totals[lane] = total;
            lightest.push(Reverse((total, lane)));
        }

        Self {
            entities,
            lane_totals,
            assignment,
        }
    }

    /// Returns the number of lanes.
    pub fn lane_count(&self) -> usize {
        self.lane_totals.len()
    }

    /// Returns all entities, heaviest first.
    pub fn entities(&self) -> &[TestEntity] {
        &self.entities
    }

    /// Returns the lane an entity was assigned to.
    pub fn lane_of(&self, key: &str) -> Option<usize> {
        self.assignment.get(key).copied()
    }

    /// Returns the total duration of each lane, in milliseconds.
    pub fn lane_totals(&self) -> &[u64] {
        &self.lane_totals
    }

    /// Returns the entities assigned to `lane`, heaviest first.
    pub fn lane_entities(&self, lane: usize) -> impl Iterator<Item = &TestEntity> + '_ {
        self.entities
            .iter()
            .filter(move |entity| self.lane_of(entity.key()) == Some(lane))
    }

    /// Computes diagnostics for this partition.
    pub fn stats(&self) -> PartitionStats {
        let lane_count = self.lane_count();
        let total_ms = self.lane_totals.iter().fold(0u64, |a, &b| a.saturating_add(b));
        let average_ms = total_ms / lane_count as u64;
        let sum_of_squares: u128 = self
            .lane_totals
            .iter()
            .map(|&lane_total| {
                let diff = i128::from(lane_total) - i128::from(average_ms);
                diff.unsigned_abs().pow(2)
            })
            .sum();
        let variance = sum_of_squares / lane_count as u128;

        PartitionStats {
            entity_count: self.entities.len(),
            lane_count,
            total_ms,
            min_ms: self.lane_totals.iter().copied().min().unwrap_or(0),
            average_ms,
            max_ms: self.lane_totals.iter().copied().max().unwrap_or(0),
            stddev_ms: u64::try_from(variance.isqrt()).unwrap_or(u64::MAX),
        }
    }
}

/// Diagnostics for a [`Partition`]. All durations are in milliseconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PartitionStats {
    /// The number of entities that were partitioned.
    pub entity_count: usize,

    /// The number of lanes.
    pub lane_count: usize,

    /// The sum of all lane totals.
    pub total_ms: u64,

    /// The smallest lane total.
    pub min_ms: u64,

    /// The average lane total, rounded down.
    pub average_ms: u64,

    /// The largest lane total.
    pub max_ms: u64,

    /// The standard deviation of lane totals, rounded down.
    pub stddev_ms: u64,
}

impl PartitionStats {
    /// Returns a displayer for the one-line summary of these stats, e.g.
    /// `5 test classes (150ms) divided into 2 sets. ...`.
    ///
    /// `word` describes the entities, e.g. "classes".
    pub fn display(&self, word: &'static str) -> DisplayPartitionStats<'_> {
        DisplayPartitionStats { stats: self, word }
    }

    /// Converts these stats into their machine-readable form.
    pub fn to_summary(&self) -> PartitionStatsSummary {
        PartitionStatsSummary {
            entity_count: self.entity_count,
            lane_count: self.lane_count,
            total_ms: self.total_ms,
            min_ms: self.min_ms,
            average_ms: self.average_ms,
            max_ms: self.max_ms,
            stddev_ms: self.stddev_ms,
        }
    }
}

/// Displays the summary line for a [`PartitionStats`].
///
/// Returned by [`PartitionStats::display`].
#[derive(Clone, Copy, Debug)]
pub struct DisplayPartitionStats<'a> {
    stats: &'a PartitionStats,
    word: &'static str,
}

impl fmt::Display for DisplayPartitionStats<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        write!(
            f,
            "{} test {} ({}ms) divided into {} sets. Min={}ms, Average={}ms, Max={}ms, stddev={}ms",
            stats.entity_count,
            self.word,
            stats.total_ms,
            stats.lane_count,
            stats.min_ms,
            stats.average_ms,
            stats.max_ms,
            stats.stddev_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_strategy::proptest;

    fn entities(durations: &[u64]) -> TestEntityMap {
        durations
            .iter()
            .enumerate()
            .map(|(i, &duration)| TestEntity::class(format!("Test{i:02}"), duration))
            .collect()
    }

    #[test]
    fn lpt_two_lanes() {
        let partition = Partition::compute(entities(&[50, 40, 30, 20, 10]), 2);

        assert_eq!(partition.lane_totals(), [80, 70]);
        let lane_keys = |lane| {
            partition
                .lane_entities(lane)
                .map(TestEntity::key)
                .collect::<Vec<_>>()
        };
        assert_eq!(lane_keys(0), ["Test00", "Test03", "Test04"]);
        assert_eq!(lane_keys(1), ["Test01", "Test02"]);

        let stats = partition.stats();
        assert_eq!(
            stats,
            PartitionStats {
                entity_count: 5,
                lane_count: 2,
                total_ms: 150,
                min_ms: 70,
                average_ms: 75,
                max_ms: 80,
                stddev_ms: 5,
            }
        );
        insta::assert_snapshot!(
            stats.display("classes").to_string(),
            @"5 test classes (150ms) divided into 2 sets. Min=70ms, Average=75ms, Max=80ms, stddev=5ms"
        );
    }

    #[test]
    fn ties_are_broken_by_key_then_lane() {
        let partition = Partition::compute(entities(&[10, 10, 10, 10]), 3);
        assert_eq!(partition.lane_of("Test00"), Some(0));
        assert_eq!(partition.lane_of("Test01"), Some(1));
        assert_eq!(partition.lane_of("Test02"), Some(2));
        assert_eq!(partition.lane_of("Test03"), Some(0));
        assert_eq!(partition.lane_totals(), [20, 10, 10]);
    }

    #[test]
    fn empty_lanes_are_allowed() {
        let partition = Partition::compute(entities(&[5]), 3);
        assert_eq!(partition.lane_totals(), [5, 0, 0]);
        let stats = partition.stats();
        assert_eq!(stats.min_ms, 0);
        assert_eq!(stats.average_ms, 1);
        // (4^2 + 1 + 1) / 3 = 6
        assert_eq!(stats.stddev_ms, 2);
    }

    #[test]
    #[should_panic(expected = "at least one lane")]
    fn zero_lanes_panics() {
        Partition::compute(entities(&[1]), 0);
    }

    #[proptest(cases = 64)]
    fn every_entity_assigned_once(
        #[strategy(proptest::collection::vec(0u64..100_000, 0..100))] durations: Vec<u64>,
        #[strategy(1usize..16)] lane_count: usize,
    ) {
        let partition = Partition::compute(entities(&durations), lane_count);

        let mut assigned = 0;
        for lane in 0..lane_count {
            let lane_sum: u64 = partition
                .lane_entities(lane)
                .map(TestEntity::duration_ms)
                .sum();
            assert_eq!(lane_sum, partition.lane_totals()[lane]);
            assigned += partition.lane_entities(lane).count();
        }
        assert_eq!(assigned, durations.len());

        let stats = partition.stats();
        assert_eq!(stats.total_ms, durations.iter().sum::<u64>());
    }

    #[proptest(cases = 64)]
    fn heaviest_lane_is_bounded(
        #[strategy(proptest::collection::vec(0u64..100_000, 1..100))] durations: Vec<u64>,
        #[strategy(1usize..16)] lane_count: usize,
    ) {
        let partition = Partition::compute(entities(&durations), lane_count);
        let stats = partition.stats();
        let max_entity = u128::from(*durations.iter().max().expect("durations is non-empty"));

        // max <= 4 * (total / n) / 3 + max_entity, without rounding.
        let n = lane_count as u128;
        assert!(
            3 * n * u128::from(stats.max_ms) <= 4 * u128::from(stats.total_ms) + 3 * n * max_entity,
            "heaviest lane {} too heavy for {stats:?}",
            stats.max_ms,
        );
    }
}
