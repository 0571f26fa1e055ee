// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// A summary of a computed split plan, as printed by `lanesplit split --message-format json`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SplitPlanSummary {
    /// Where the test durations used for this plan came from.
    pub source: PlanSourceSummary,

    /// The granularity the tests were split at, e.g. `class`.
    pub granularity: String,

    /// Partition diagnostics.
    ///
    /// Absent if there was nothing to split and a single lane runs everything.
    #[serde(default)]
    pub stats: Option<PartitionStatsSummary>,

    /// One entry per lane, in lane order.
    pub lanes: Vec<LaneSummary>,
}

/// The source of the durations used for a split plan.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum PlanSourceSummary {
    /// Durations were observed in a previous build.
    Reference {
        /// The display name of the build.
        build: String,

        /// The pipeline stage the results were narrowed to, if any.
        #[serde(default)]
        stage: Option<String>,
    },

    /// No previous build was usable, and tests were discovered from source files with a nominal
    /// duration.
    Estimate,

    /// No data was available.
    None,
}

/// Partition diagnostics for a split plan. All durations are in milliseconds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionStatsSummary {
    /// The number of test entities that were split.
    pub entity_count: usize,

    /// The number of lanes.
    pub lane_count: usize,

    /// The sum of all entity durations.
    pub total_ms: u64,

    /// The total duration of the lightest lane.
    pub min_ms: u64,

    /// The average total duration per lane.
    pub average_ms: u64,

    /// The total duration of the heaviest lane.
    pub max_ms: u64,

    /// The standard deviation of lane totals.
    pub stddev_ms: u64,
}

/// A single lane in a split plan.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LaneSummary {
    /// The index of the lane, starting from 0.
    pub index: usize,

    /// Whether the patterns list the tests to run (`include`) or the tests to skip (`exclude`).
    pub kind: LaneKind,

    /// The number of patterns for this lane.
    pub pattern_count: usize,

    /// The file the patterns were written to.
    #[serde(default)]
    pub path: Option<Utf8PathBuf>,
}

/// Whether a lane's patterns are inclusions or exclusions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaneKind {
    /// The lane runs exactly the listed tests.
    Include,

    /// The lane runs everything except the listed tests.
    Exclude,
}

impl LaneKind {
    /// Returns the string used for this kind in file names and output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn summary_json_shape() {
        let summary = SplitPlanSummary {
            source: PlanSourceSummary::Reference {
                build: "main #41".to_owned(),
                stage: None,
            },
            granularity: "class".to_owned(),
            stats: Some(PartitionStatsSummary {
                entity_count: 5,
                lane_count: 2,
                total_ms: 150,
                min_ms: 70,
                average_ms: 75,
                max_ms: 80,
                stddev_ms: 5,
            }),
            lanes: vec![LaneSummary {
                index: 0,
                kind: LaneKind::Exclude,
                pattern_count: 4,
                path: Some("target/lanesplit/split.0.exclude.txt".into()),
            }],
        };

        let value = serde_json::to_value(&summary).expect("summary serializes");
        assert_eq!(
            value,
            json!({
                "source": { "kind": "reference", "build": "main #41", "stage": null },
                "granularity": "class",
                "stats": {
                    "entity-count": 5,
                    "lane-count": 2,
                    "total-ms": 150,
                    "min-ms": 70,
                    "average-ms": 75,
                    "max-ms": 80,
                    "stddev-ms": 5,
                },
                "lanes": [{
                    "index": 0,
                    "kind": "exclude",
                    "pattern-count": 4,
                    "path": "target/lanesplit/split.0.exclude.txt",
                }],
            })
        );
    }

    #[test_case(r#"{ "kind": "estimate" }"#, PlanSourceSummary::Estimate; "estimate")]
    #[test_case(r#"{ "kind": "none" }"#, PlanSourceSummary::None; "none")]
    #[test_case(
        r#"{ "kind": "reference", "build": "b" }"#,
        PlanSourceSummary::Reference { build: "b".to_owned(), stage: None };
        "reference without stage"
    )]
    fn parse_source(input: &str, expected: PlanSourceSummary) {
        let source: PlanSourceSummary = serde_json::from_str(input).expect("valid source");
        assert_eq!(source, expected);
    }
}
