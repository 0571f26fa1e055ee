// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{BuildStatus, FlowGraph, ReferenceCandidate};
use crate::errors::{HistoryError, HistoryStoreError};
use camino::{Utf8Path, Utf8PathBuf};
use lanesplit_report::{ResultTree, read_junit_cases};
use serde::{Deserialize, de::DeserializeOwned};
use std::{fs, io, io::BufReader, sync::Arc};
use tracing::{debug, warn};

/// Build history stored in a directory on the local filesystem.
///
/// The layout is:
///
/// ```text
/// <root>/branches/<branch>/branch.toml
/// <root>/branches/<branch>/builds/<number>/build.toml
/// <root>/branches/<branch>/builds/<number>/flow.toml
/// <root>/branches/<branch>/builds/<number>/results/**/*.xml
/// ```
///
/// All files are optional.
#[derive(Clone, Debug)]
pub struct BuildHistoryStore {
    root: Utf8PathBuf,
}

impl BuildHistoryStore {
    /// Opens the store at `root`, which must be an existing directory.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, HistoryStoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(HistoryStoreError::RootNotFound { path: root });
        }
        Ok(Self { root })
    }

    /// Returns the root directory of the store.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the build being split for: build `number` of `branch`.
    ///
    /// If `number` is `None`, the current build is the one after the branch's latest recorded
    /// build. The current build doesn't need to exist in the store.
    pub fn current_build(
        &self,
        branch: &str,
        number: Option<u64>,
    ) -> Result<StoredBuild<'_>, HistoryStoreError> {
        let history = Arc::new(self.branch(branch)?);
        let number = match number {
            Some(number) => number,
            None => history.builds.last().map_or(1, |latest| latest + 1),
        };
        debug!("current build is {branch} #{number}");
        Ok(StoredBuild::load(self, history, number))
    }

    /// Reads the list of builds recorded for `branch`.
    ///
    /// A branch that doesn't exist has no builds.
    pub fn branch(&self, name: &str) -> Result<BranchHistory, HistoryStoreError> {
        let dir = self.root.join("branches").join(name);
        let metadata: BranchMetadata = read_toml(&dir.join("branch.toml"))?.unwrap_or_default();

        let builds_dir = dir.join("builds");
        let mut builds = Vec::new();
        match builds_dir.read_dir_utf8() {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry.map_err(|err| HistoryStoreError::ReadDir {
                        path: builds_dir.clone(),
                        err,
                    })?;
                    match entry.file_name().parse::<u64>() {
                        Ok(number) if entry.path().is_dir() => builds.push(number),
                        _ => debug!("ignoring non-build entry {}", entry.path()),
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("branch {name} has no recorded builds");
            }
            Err(err) => {
                return Err(HistoryStoreError::ReadDir {
                    path: builds_dir,
                    err,
                });
            }
        }
        builds.sort_unstable();

        Ok(BranchHistory {
            name: name.to_owned(),
            dir,
            change_target: metadata.change_target,
            builds,
        })
    }
}

/// The builds recorded for a single branch.
#[derive(Clone, Debug)]
pub struct BranchHistory {
    name: String,
    dir: Utf8PathBuf,
    change_target: Option<String>,
    // Sorted in ascending order.
    builds: Vec<u64>,
}

impl BranchHistory {
    /// Returns the name of the branch.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the branch a change request on this branch targets, if any.
    pub fn change_target(&self) -> Option<&str> {
        self.change_target.as_deref()
    }

    /// Returns the numbers of all recorded builds, oldest first.
    pub fn builds(&self) -> &[u64] {
        &self.builds
    }

    fn build_dir(&self, number: u64) -> Utf8PathBuf {
        self.dir.join("builds").join(number.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BranchMetadata {
    #[serde(default)]
    change_target: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct BuildMetadata {
    #[serde(default)]
    status: BuildStatus,
    #[serde(default)]
    building: bool,
    #[serde(default)]
    test_count: Option<usize>,
    #[serde(default)]
    display_name: Option<String>,
}

/// A single build within a [`BuildHistoryStore`].
#[derive(Clone, Debug)]
pub struct StoredBuild<'store> {
    store: &'store BuildHistoryStore,
    branch: Arc<BranchHistory>,
    number: u64,
    change_target: Option<String>,
    display_name: String,
    metadata: BuildMetadata,
}

impl<'store> StoredBuild<'store> {
    fn load(store: &'store BuildHistoryStore, branch: Arc<BranchHistory>, number: u64) -> Self {
        let path = branch.build_dir(number).join("build.toml");
        let metadata = match read_toml::<BuildMetadata>(&path) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => BuildMetadata::default(),
            Err(error) => {
                warn!("treating build {} #{number} as not built: {error}", branch.name);
                BuildMetadata::default()
            }
        };
        let display_name = metadata
            .display_name
            .clone()
            .unwrap_or_else(|| format!("{} #{number}", branch.name));

        Self {
            store,
            change_target: branch.change_target.clone(),
            branch,
            number,
            display_name,
            metadata,
        }
    }

    /// Overrides the branch a change request for this build targets.
    pub fn with_change_target(mut self, change_target: Option<String>) -> Self {
        if change_target.is_some() {
            self.change_target = change_target;
        }
        self
    }

    /// Returns the branch this build belongs to.
    pub fn branch(&self) -> &BranchHistory {
        &self.branch
    }

    /// Returns the number of this build.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns the directory this build is stored in.
    pub fn dir(&self) -> Utf8PathBuf {
        self.branch.build_dir(self.number)
    }
}

impl ReferenceCandidate for StoredBuild<'_> {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn status(&self) -> BuildStatus {
        self.metadata.status
    }

    fn is_building(&self) -> bool {
        self.metadata.building
    }

    fn supposed_count(&self) -> Option<usize> {
        self.metadata.test_count
    }

    fn load_result_tree(&self) -> Result<Option<ResultTree>, HistoryError> {
        let results_dir = self.dir().join("results");
        if !results_dir.is_dir() {
            return Ok(None);
        }

        let mut trees = Vec::new();
        for entry in walkdir::WalkDir::new(&results_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| HistoryError::ReadResultsDir {
                path: results_dir.clone(),
                err,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = match Utf8PathBuf::try_from(entry.into_path()) {
                Ok(path) => path,
                Err(error) => {
                    debug!("ignoring non-UTF-8 result path: {error}");
                    continue;
                }
            };
            if path.extension() != Some("xml") {
                continue;
            }

            let file = fs::File::open(&path).map_err(|err| HistoryError::OpenResult {
                path: path.clone(),
                err,
            })?;
            let cases = read_junit_cases(BufReader::new(file))
                .map_err(|err| HistoryError::ParseResult { path: path.clone(), err })?;
            trees.push(ResultTree::from_cases(path.as_str(), cases));
        }

        if trees.is_empty() {
            return Ok(None);
        }
        Ok(Some(ResultTree::merge(self.display_name.clone(), trees)))
    }

    fn previous(&self) -> Option<Self> {
        let index = self.branch.builds.partition_point(|&n| n < self.number);
        let number = *self.branch.builds.get(index.checked_sub(1)?)?;
        let previous = Self::load(self.store, self.branch.clone(), number);
        Some(previous.with_change_target(self.change_target.clone()))
    }

    fn target_branch_latest(&self) -> Option<Self> {
        let target = self.change_target.as_deref()?;
        let history = match self.store.branch(target) {
            Ok(history) => history,
            Err(error) => {
                warn!("failed to read target branch {target}: {error}");
                return None;
            }
        };
        let Some(&latest) = history.builds.last() else {
            debug!("target branch {target} has no recorded builds");
            return None;
        };
        Some(Self::load(self.store, Arc::new(history), latest))
    }

    fn flow_graph(&self) -> Option<FlowGraph> {
        match read_toml(&self.dir().join("flow.toml")) {
            Ok(graph) => graph,
            Err(error) => {
                warn!("ignoring flow graph for build {}: {error}", self.display_name);
                None
            }
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Utf8Path) -> Result<Option<T>, HistoryStoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(HistoryStoreError::ReadMetadata {
                path: path.to_owned(),
                err,
            });
        }
    };
    toml::from_str(&contents)
        .map(Some)
        .map_err(|err| HistoryStoreError::ParseMetadata {
            path: path.to_owned(),
            err: Box::new(err),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const RESULTS: &str = indoc! {r#"
        <testsuites>
          <testsuite name="suite">
            <testcase classname="org.example.FooTest" name="a" time="1.5"/>
            <testcase classname="org.example.FooTest" name="b" time="0.25">
              <failure message="boom"/>
            </testcase>
          </testsuite>
        </testsuites>
    "#};

    fn write(root: &Utf8Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("path has a parent")).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn build_toml(status: &str) -> String {
        format!("status = \"{status}\"\n")
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = Utf8TempDir::new().unwrap();
        let error = BuildHistoryStore::open(dir.path().join("nope")).unwrap_err();
        assert!(
            matches!(error, HistoryStoreError::RootNotFound { .. }),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn builds_are_ordered_numerically() {
        let dir = Utf8TempDir::new().unwrap();
        for number in ["2", "10", "1", "latest"] {
            fs::create_dir_all(dir.path().join("branches/main/builds").join(number)).unwrap();
        }
        write(dir.path(), "branches/main/builds/7", "not a directory");

        let store = BuildHistoryStore::open(dir.path()).unwrap();
        let branch = store.branch("main").unwrap();
        assert_eq!(branch.builds(), [1, 2, 10]);
        assert_eq!(branch.change_target(), None);

        let current = store.current_build("main", None).unwrap();
        assert_eq!(current.number(), 11);
        assert_eq!(current.display_name(), "main #11");

        let previous = current.previous().expect("has a previous build");
        assert_eq!(previous.number(), 10);
        let previous = previous.previous().expect("has a previous build");
        assert_eq!(previous.number(), 2);

        let explicit = store.current_build("main", Some(2)).unwrap();
        assert_eq!(explicit.previous().map(|build| build.number()), Some(1));
        assert!(store.current_build("main", Some(1)).unwrap().previous().is_none());
    }

    #[test]
    fn unknown_branch_has_no_builds() {
        let dir = Utf8TempDir::new().unwrap();
        let store = BuildHistoryStore::open(dir.path()).unwrap();
        let current = store.current_build("feature", None).unwrap();
        assert_eq!(current.number(), 1);
        assert!(current.previous().is_none());
    }

    #[test]
    fn reads_build_metadata_and_results() {
        let dir = Utf8TempDir::new().unwrap();
        write(
            dir.path(),
            "branches/main/builds/1/build.toml",
            indoc! {r#"
                status = "unstable"
                test-count = 2
                display-name = "nightly #1"
            "#},
        );
        write(dir.path(), "branches/main/builds/1/results/a/TEST-foo.xml", RESULTS);
        write(dir.path(), "branches/main/builds/1/results/notes.txt", "not xml");

        let store = BuildHistoryStore::open(dir.path()).unwrap();
        let build = store
            .current_build("main", None)
            .unwrap()
            .previous()
            .expect("build 1 exists");

        assert_eq!(build.display_name(), "nightly #1");
        assert_eq!(build.status(), BuildStatus::Unstable);
        assert!(!build.is_building());
        assert_eq!(build.supposed_count(), Some(2));

        let tree = build
            .load_result_tree()
            .expect("results are valid")
            .expect("results exist");
        assert_eq!(tree.name(), "nightly #1");
        assert_eq!(tree.total_count(), 2);
        assert_eq!(tree.fail_count(), 1);
    }

    #[test]
    fn missing_metadata_means_not_built() {
        let dir = Utf8TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("branches/main/builds/3")).unwrap();
        write(dir.path(), "branches/main/builds/4/build.toml", "status = [");

        let store = BuildHistoryStore::open(dir.path()).unwrap();
        let four = store.current_build("main", None).unwrap().previous().unwrap();
        assert_eq!(four.status(), BuildStatus::NotBuilt);
        let three = four.previous().unwrap();
        assert_eq!(three.status(), BuildStatus::NotBuilt);
        assert!(three.load_result_tree().unwrap().is_none());
        assert!(three.flow_graph().is_none());
    }

    #[test]
    fn corrupt_results_are_an_error() {
        let dir = Utf8TempDir::new().unwrap();
        write(dir.path(), "branches/main/builds/1/build.toml", &build_toml("success"));
        write(
            dir.path(),
            "branches/main/builds/1/results/TEST-bad.xml",
            "<testsuite><testcase classname=\"A\"/></testsuite>",
        );

        let store = BuildHistoryStore::open(dir.path()).unwrap();
        let build = store.current_build("main", None).unwrap().previous().unwrap();
        let error = build.load_result_tree().unwrap_err();
        assert!(
            matches!(error, HistoryError::ParseResult { .. }),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn change_target_from_branch_or_override() {
        let dir = Utf8TempDir::new().unwrap();
        write(dir.path(), "branches/pr-7/branch.toml", "change-target = \"main\"\n");
        write(dir.path(), "branches/main/builds/41/build.toml", &build_toml("success"));
        write(dir.path(), "branches/main/builds/42/build.toml", &build_toml("failure"));
        fs::create_dir_all(dir.path().join("branches/release/builds/5")).unwrap();

        let store = BuildHistoryStore::open(dir.path()).unwrap();
        let current = store.current_build("pr-7", None).unwrap();
        assert_eq!(current.branch().change_target(), Some("main"));
        let latest = current.target_branch_latest().expect("main has builds");
        assert_eq!(latest.display_name(), "main #42");
        assert_eq!(latest.status(), BuildStatus::Failure);

        let overridden = current.with_change_target(Some("release".to_owned()));
        let latest = overridden.target_branch_latest().expect("release has builds");
        assert_eq!(latest.display_name(), "release #5");

        let main = store.current_build("main", None).unwrap();
        assert!(main.target_branch_latest().is_none());
    }

    #[test]
    fn reads_flow_graph() {
        let dir = Utf8TempDir::new().unwrap();
        write(
            dir.path(),
            "branches/main/builds/1/flow.toml",
            indoc! {r#"
                [[nodes]]
                id = "2"
                label = "Build"

                [[nodes]]
                id = "5"
                label = "Test"
                parents = ["2"]
            "#},
        );

        let store = BuildHistoryStore::open(dir.path()).unwrap();
        let build = store.current_build("main", None).unwrap().previous().unwrap();
        let graph = build.flow_graph().expect("flow graph exists");
        assert_eq!(graph.find_labeled("Test").map(|node| node.id()), Some("5"));
    }
}
