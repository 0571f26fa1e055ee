// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Computing split plans.
//!
//! [`TestSplitter`] ties everything together: it finds a reference build, flattens its results into
//! entities (or estimates them from source files), partitions the entities into lanes, and produces
//! the patterns for each lane.

use crate::{
    entity::TestEntityMap,
    estimate::WorkspaceLister,
    granularity::{GranularityMode, TestMode, extract},
    history::{DEFAULT_SEARCH_DEPTH, ReferenceCandidate, ResultLocator},
    parallelism::Parallelism,
    partition::{Partition, PartitionStats},
    patterns::{InclusionExclusionPattern, generate},
    sink::DirSink,
};
use lanesplit_metadata::{LaneSummary, PlanSourceSummary, SplitPlanSummary};
use tracing::{info, warn};

/// Splits tests into lanes.
#[derive(Clone, Debug)]
pub struct TestSplitter {
    parallelism: Parallelism,
    granularity: GranularityMode,
    generate_inclusions: bool,
    stage: Option<String>,
    estimate_tests_from_files: bool,
    search_depth: usize,
}

impl TestSplitter {
    /// Creates a new splitter with the given parallelism, and defaults for everything else.
    pub fn new(parallelism: Parallelism) -> Self {
        Self {
            parallelism,
            granularity: GranularityMode::default(),
            generate_inclusions: false,
            stage: None,
            estimate_tests_from_files: false,
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }

    /// Sets the number of lanes to split into.
    pub fn set_parallelism(&mut self, parallelism: Parallelism) -> &mut Self {
        self.parallelism = parallelism;
        self
    }

    /// Sets the unit that tests are split by.
    pub fn set_granularity(&mut self, granularity: GranularityMode) -> &mut Self {
        self.granularity = granularity;
        self
    }

    /// If true, lanes other than lane 0 list the tests to run rather than the tests to skip.
    pub fn set_generate_inclusions(&mut self, generate_inclusions: bool) -> &mut Self {
        self.generate_inclusions = generate_inclusions;
        self
    }

    /// Only consider results recorded within the pipeline stage with this label.
    pub fn set_stage(&mut self, stage: Option<String>) -> &mut Self {
        self.stage = stage;
        self
    }

    /// If true and no reference build is found, discover tests from source files.
    pub fn set_estimate_tests_from_files(&mut self, estimate: bool) -> &mut Self {
        self.estimate_tests_from_files = estimate;
        self
    }

    /// Sets the maximum number of builds inspected per history walk.
    pub fn set_search_depth(&mut self, search_depth: usize) -> &mut Self {
        self.search_depth = search_depth;
        self
    }

    /// Returns the configured parallelism.
    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Returns the configured granularity.
    pub fn granularity(&self) -> GranularityMode {
        self.granularity
    }

    /// Computes a split plan for `current`, using the default history search.
    ///
    /// `workspace` is used for estimation, if enabled.
    pub fn find_test_splits<C: ReferenceCandidate>(
        &self,
        current: &C,
        workspace: Option<&dyn WorkspaceLister>,
    ) -> SplitPlan {
        let locator = ResultLocator::new(self.search_depth);
        self.find_test_splits_with(&locator, current, workspace)
    }

    /// Computes a split plan for `current`, searching history with `locator`.
    pub fn find_test_splits_with<C: ReferenceCandidate>(
        &self,
        locator: &ResultLocator<C>,
        current: &C,
        workspace: Option<&dyn WorkspaceLister>,
    ) -> SplitPlan {
        let mode = self.granularity.build();

        let (entities, source) = match locator.locate(current) {
            Some(located) => {
                let located = match &self.stage {
                    Some(stage) => located.narrow_to_stage(stage),
                    None => located,
                };
                let (candidate, tree) = located.into_parts();
                let source = PlanSource::Reference {
                    build: candidate.display_name().to_owned(),
                    stage: self.stage.clone(),
                };
                (extract(&tree, mode.as_ref()), source)
            }
            None => {
                info!("no record available, try to find test classes");
                let entities = self.estimate(mode.as_ref(), workspace);
                let source = if entities.is_empty() {
                    PlanSource::None
                } else {
                    PlanSource::Estimate
                };
                (entities, source)
            }
        };

        if entities.is_empty() {
            info!("no test classes were found, so executing everything in one place");
            return SplitPlan {
                granularity: self.granularity,
                patterns: vec![InclusionExclusionPattern::run_everything()],
                stats: None,
                source,
            };
        }

        let lane_count = self.parallelism.calculate(&entities).max(1);
        let partition = Partition::compute(entities, lane_count);
        let stats = partition.stats();
        info!("{}", stats.display(mode.word()));

        SplitPlan {
            granularity: self.granularity,
            patterns: generate(&partition, self.generate_inclusions),
            stats: Some(stats),
            source,
        }
    }

    fn estimate(
        &self,
        mode: &dyn TestMode,
        workspace: Option<&dyn WorkspaceLister>,
    ) -> TestEntityMap {
        let workspace = match workspace {
            Some(workspace) if self.estimate_tests_from_files => workspace,
            _ => return TestEntityMap::new(),
        };
        match mode.estimate(workspace) {
            Ok(entities) => entities,
            Err(error) => {
                warn!("unable to determine tests to run from files: {error}");
                TestEntityMap::new()
            }
        }
    }
}

/// Where the durations used for a [`SplitPlan`] came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlanSource {
    /// Results recorded by a previous build.
    Reference {
        /// The display name of the build.
        build: String,

        /// The pipeline stage results were narrowed to, if requested.
        stage: Option<String>,
    },

    /// Tests discovered from source files, with nominal durations.
    Estimate,

    /// Nothing was found.
    None,
}

impl PlanSource {
    /// Converts this into its machine-readable form.
    pub fn to_summary(&self) -> PlanSourceSummary {
        match self {
            Self::Reference { build, stage } => PlanSourceSummary::Reference {
                build: build.clone(),
                stage: stage.clone(),
            },
            Self::Estimate => PlanSourceSummary::Estimate,
            Self::None => PlanSourceSummary::None,
        }
    }
}

/// The result of [`TestSplitter::find_test_splits`].
#[derive(Clone, Debug)]
pub struct SplitPlan {
    granularity: GranularityMode,
    patterns: Vec<InclusionExclusionPattern>,
    stats: Option<PartitionStats>,
    source: PlanSource,
}

impl SplitPlan {
    /// Returns the patterns for each lane, in lane order. There is always at least one.
    pub fn patterns(&self) -> &[InclusionExclusionPattern] {
        &self.patterns
    }

    /// Returns partition diagnostics, or `None` if every test runs in a single lane because no
    /// tests were found.
    pub fn stats(&self) -> Option<&PartitionStats> {
        self.stats.as_ref()
    }

    /// Returns where the durations came from.
    pub fn source(&self) -> &PlanSource {
        &self.source
    }

    /// Converts this plan into its machine-readable form.
    ///
    /// If `sink` is provided, each lane includes the path it was written to.
    pub fn to_summary(&self, sink: Option<&DirSink>) -> SplitPlanSummary {
        let lanes = self
            .patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| LaneSummary {
                index,
                kind: pattern.kind(),
                pattern_count: pattern.patterns().len(),
                path: sink.map(|sink| sink.path_for(index, pattern)),
            })
            .collect();

        SplitPlanSummary {
            source: self.source.to_summary(),
            granularity: self.granularity.to_string(),
            stats: self.stats.as_ref().map(PartitionStats::to_summary),
            lanes,
        }
    }
}
