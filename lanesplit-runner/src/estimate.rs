// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering tests from source files, for when no previous results are available.

use crate::{
    entity::{ESTIMATED_DURATION_MS, TestEntity, TestEntityMap},
    errors::EstimationError,
};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::{fmt, sync::LazyLock};
use tracing::debug;

/// Glob patterns matching Java test sources, relative to a workspace root.
pub const JAVA_TEST_PATTERNS: &[&str] = &[
    "**/src/test/java/**/Test*.java",
    "**/src/test/java/**/*Test.java",
    "**/src/test/java/**/*Tests.java",
    "**/src/test/java/**/*TestCase.java",
];

static JAVA_TEST_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|.*/)src/test/java/(.+)\.java$").expect("test source regex is valid")
});

/// Lists files within a workspace.
pub trait WorkspaceLister: fmt::Debug {
    /// Returns the paths of files matching any of `patterns`, relative to the workspace root and
    /// with `/` separators.
    fn list(&self, patterns: &[&str]) -> Result<Vec<Utf8PathBuf>, EstimationError>;
}

/// A [`WorkspaceLister`] over a directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct FsWorkspace {
    root: Utf8PathBuf,
}

impl FsWorkspace {
    /// Creates a new lister rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the workspace root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl WorkspaceLister for FsWorkspace {
    fn list(&self, patterns: &[&str]) -> Result<Vec<Utf8PathBuf>, EstimationError> {
        let glob_set = build_glob_set(patterns)?;

        let mut matches = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|err| EstimationError::Walk {
                root: self.root.clone(),
                err,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or_else(|_| entry.path());
            let relative = Utf8Path::from_path(relative).ok_or_else(|| {
                EstimationError::NonUtf8Path {
                    path: entry.path().to_owned(),
                }
            })?;
            let relative = Utf8PathBuf::from(relative.as_str().replace('\\', "/"));
            if glob_set.is_match(relative.as_str()) {
                matches.push(relative);
            }
        }

        debug!(
            "found {} files matching test source patterns under {}",
            matches.len(),
            self.root
        );
        Ok(matches)
    }
}

fn build_glob_set(patterns: &[&str]) -> Result<GlobSet, EstimationError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// Discovers Java test classes in a workspace.
///
/// Each source file matching [`JAVA_TEST_PATTERNS`] becomes a class entity keyed by its path
/// relative to `src/test/java/`, without the `.java` extension (e.g. `pkg/sub/FooTest`). Every
/// class gets the same nominal duration.
pub fn estimate_java_classes(
    lister: &dyn WorkspaceLister,
) -> Result<TestEntityMap, EstimationError> {
    let mut entities = TestEntityMap::new();
    for path in lister.list(JAVA_TEST_PATTERNS)? {
        let key = JAVA_TEST_SOURCE
            .captures(path.as_str())
            .and_then(|captures| captures.get(1))
            .ok_or_else(|| EstimationError::UnexpectedLayout { path: path.clone() })?
            .as_str();
        entities.insert_replacing(TestEntity::class(key, ESTIMATED_DURATION_MS));
    }
    Ok(entities)
}
