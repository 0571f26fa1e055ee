// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding test results from a previous build to use as a reference.
//!
//! The search walks backwards from the build before the current one. Builds that are still running,
//! didn't succeed, or have no usable results are skipped. If nothing is found within the search
//! depth, each [`PreviousBuildFinder`] gets a chance to supply another starting point (for
//! example, the latest build of the branch a change request targets), and the same bounded walk
//! runs from there.

mod stage;
mod store;

pub use stage::*;
pub use store::*;

use crate::errors::HistoryError;
use lanesplit_report::ResultTree;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info, warn};

/// The default maximum number of builds inspected per history walk.
pub const DEFAULT_SEARCH_DEPTH: usize = 20;

/// The outcome of a build.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStatus {
    /// The build succeeded.
    Success,

    /// The build completed, but some tests failed.
    Unstable,

    /// The build failed.
    Failure,

    /// The build was aborted.
    Aborted,

    /// The build never ran, or has no recorded outcome.
    #[default]
    NotBuilt,
}

impl BuildStatus {
    /// Returns true if results from a build with this status may be used as a reference.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Success | Self::Unstable)
    }
}

/// A previous build whose results may be used as a reference.
pub trait ReferenceCandidate: Sized {
    /// A human-readable name for this build, used in logs.
    fn display_name(&self) -> &str;

    /// The outcome of this build.
    fn status(&self) -> BuildStatus;

    /// Returns true if this build is still running.
    fn is_building(&self) -> bool;

    /// The number of test results this build claims to have, if known.
    fn supposed_count(&self) -> Option<usize>;

    /// Loads the test results of this build.
    ///
    /// Returns `Ok(None)` if this build has no test results at all.
    fn load_result_tree(&self) -> Result<Option<ResultTree>, HistoryError>;

    /// Returns the build before this one, if any.
    fn previous(&self) -> Option<Self>;

    /// For a build of a change request, returns the latest build of the branch the change targets.
    fn target_branch_latest(&self) -> Option<Self> {
        None
    }

    /// Returns the graph of pipeline steps executed by this build, if recorded.
    fn flow_graph(&self) -> Option<FlowGraph> {
        None
    }
}

/// Supplies an additional starting point for the search, once the current build's own history is
/// exhausted.
pub trait PreviousBuildFinder<C>: fmt::Debug {
    /// Returns the first build to inspect. This build is itself a candidate.
    fn find(&self, current: &C) -> Option<C>;
}

/// Continues the search from the latest build of a change request's target branch.
#[derive(Clone, Copy, Debug, Default)]
pub struct TargetBranchFinder;

impl<C: ReferenceCandidate> PreviousBuildFinder<C> for TargetBranchFinder {
    fn find(&self, current: &C) -> Option<C> {
        current.target_branch_latest()
    }
}

/// A build found by [`ResultLocator::locate`], along with its results.
#[derive(Debug)]
pub struct LocatedResult<C> {
    candidate: C,
    tree: ResultTree,
}

impl<C: ReferenceCandidate> LocatedResult<C> {
    /// Returns the build the results came from.
    pub fn candidate(&self) -> &C {
        &self.candidate
    }

    /// Returns the results.
    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    /// Splits this into its build and results.
    pub fn into_parts(self) -> (C, ResultTree) {
        (self.candidate, self.tree)
    }

    /// Narrows the results to those recorded within the pipeline stage labeled `stage`.
    ///
    /// If the build has no flow graph, or no step is labeled `stage`, the results are left as is.
    pub fn narrow_to_stage(self, stage: &str) -> Self {
        let Some(graph) = self.candidate.flow_graph() else {
            info!(
                "build {} has no recorded pipeline steps, using all results",
                self.candidate.display_name()
            );
            return self;
        };

        match graph.find_labeled(stage) {
            Some(node) => {
                info!(
                    "found stage \"{stage}\" in {}",
                    self.candidate.display_name()
                );
                let tree = self.tree.for_pipeline_block(node.id());
                Self {
                    candidate: self.candidate,
                    tree,
                }
            }
            None => {
                info!(
                    "stage \"{stage}\" not found in {}, using all results",
                    self.candidate.display_name()
                );
                self
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum WalkContext {
    // The current build's own history.
    Primary,
    // The history supplied by the finder with this index.
    Finder(usize),
}

#[derive(Debug)]
struct Walk<C> {
    context: WalkContext,
    next: Option<C>,
    remaining: usize,
}

/// Searches build history for a usable set of test results.
#[derive(Debug)]
pub struct ResultLocator<C> {
    search_depth: usize,
    finders: Vec<Box<dyn PreviousBuildFinder<C>>>,
}

impl<C: ReferenceCandidate> ResultLocator<C> {
    /// Creates a new locator with the given search depth and a [`TargetBranchFinder`].
    pub fn new(search_depth: usize) -> Self {
        Self {
            search_depth,
            finders: vec![Box::new(TargetBranchFinder)],
        }
    }

    /// Creates a new locator with the given search depth and finders.
    pub fn with_finders(
        search_depth: usize,
        finders: impl IntoIterator<Item = Box<dyn PreviousBuildFinder<C>>>,
    ) -> Self {
        Self {
            search_depth,
            finders: finders.into_iter().collect(),
        }
    }

    /// Returns the maximum number of builds inspected per walk.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    /// Finds the most recent usable results before `current`.
    ///
    /// Returns `None` if no usable results were found. That is not an error.
    pub fn locate(&self, current: &C) -> Option<LocatedResult<C>> {
        let mut walk = Walk {
            context: WalkContext::Primary,
            next: current.previous(),
            remaining: self.search_depth,
        };

        loop {
            match walk.next.take() {
                Some(candidate) if walk.remaining > 0 => {
                    walk.remaining -= 1;
                    if let Some(tree) = self.inspect(&candidate) {
                        return Some(LocatedResult { candidate, tree });
                    }
                    walk.next = candidate.previous();
                }
                _ => {
                    walk = self.next_walk(current, walk.context)?;
                }
            }
        }
    }

    fn next_walk(&self, current: &C, finished: WalkContext) -> Option<Walk<C>> {
        let first = match finished {
            WalkContext::Primary => 0,
            WalkContext::Finder(index) => index + 1,
        };
        for (index, finder) in self.finders.iter().enumerate().skip(first) {
            if let Some(start) = finder.find(current) {
                debug!(
                    "continuing search from {} using {finder:?}",
                    start.display_name()
                );
                return Some(Walk {
                    context: WalkContext::Finder(index),
                    next: Some(start),
                    remaining: self.search_depth,
                });
            }
        }
        None
    }

    fn inspect(&self, candidate: &C) -> Option<ResultTree> {
        let name = candidate.display_name();
        if candidate.is_building() {
            debug!("build {name} is still building, skipping");
            return None;
        }
        let status = candidate.status();
        if !status.is_accepted() {
            debug!("build {name} has status {status:?}, skipping");
            return None;
        }

        match candidate.load_result_tree() {
            Ok(Some(tree)) if tree.total_count() > 0 => {
                info!("using build {name} as reference");
                Some(tree)
            }
            Ok(Some(_)) => {
                info!(
                    "build {name} has no loadable test results (supposed count {}), skipping",
                    DisplaySupposedCount(candidate.supposed_count()),
                );
                None
            }
            Ok(None) => {
                debug!("build {name} has no test results, skipping");
                None
            }
            Err(error) => {
                warn!("failed to load (corrupt?) build {name}, skipping: {error}");
                None
            }
        }
    }
}

struct DisplaySupposedCount(Option<usize>);

impl fmt::Display for DisplaySupposedCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(count) => write!(f, "{count}"),
            None => f.write_str("unknown"),
        }
    }
}
