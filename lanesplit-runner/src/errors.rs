// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by lanesplit.

use crate::granularity::GranularityMode;
use camino::Utf8PathBuf;
use config::ConfigError;
use lanesplit_report::ReportReadError;
use std::{borrow::Cow, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse lanesplit config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(ConfigError),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(serde_path_to_error::Error<ConfigError>),
}

/// An error which indicates that a profile was requested but not known to lanesplit.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }

    /// Returns the profile that wasn't found.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

/// An error that occurs while parsing a [`Parallelism`](crate::parallelism::Parallelism) input.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub struct ParallelismParseError {
    expected_format: Option<&'static str>,
    message: Cow<'static, str>,
}

impl ParallelismParseError {
    pub(crate) fn new(
        expected_format: Option<&'static str>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            expected_format,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParallelismParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expected_format {
            Some(format) => {
                write!(
                    f,
                    "parallelism must be in the format \"{}\":\n{}",
                    format, self.message
                )
            }
            None => write!(f, "{}", self.message),
        }
    }
}

/// Error returned while parsing a [`GranularityMode`] value from a string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error(
    "unrecognized value for granularity: {input}\n(known values: {})",
    GranularityMode::variants().join(", ")
)]
pub struct GranularityModeParseError {
    input: String,
}

impl GranularityModeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while reading a single build from history.
///
/// These errors are recovered from: the build is skipped and the search continues.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    /// A results directory could not be listed.
    #[error("error reading results directory `{path}`")]
    ReadResultsDir {
        /// The directory that was being read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A result file could not be opened.
    #[error("error opening result file `{path}`")]
    OpenResult {
        /// The file that was being opened.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A result file could not be parsed.
    #[error("error parsing result file `{path}`")]
    ParseResult {
        /// The file that was being parsed.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: ReportReadError,
    },
}

/// An error that occurred while opening a build history store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryStoreError {
    /// The history directory does not exist.
    #[error("history directory `{path}` does not exist")]
    RootNotFound {
        /// The history directory.
        path: Utf8PathBuf,
    },

    /// A directory within the store could not be read.
    #[error("error reading directory `{path}`")]
    ReadDir {
        /// The directory that was being read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A metadata file within the store could not be read.
    #[error("error reading metadata file `{path}`")]
    ReadMetadata {
        /// The file that was being read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A metadata file within the store could not be parsed.
    #[error("error parsing metadata file `{path}`")]
    ParseMetadata {
        /// The file that was being parsed.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: Box<toml::de::Error>,
    },
}

/// An error that occurred while discovering tests from source files.
///
/// These errors are recovered from: no tests are estimated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EstimationError {
    /// A glob pattern failed to compile.
    #[error("invalid glob pattern")]
    Glob(#[from] globset::Error),

    /// The workspace could not be walked.
    #[error("error walking workspace `{root}`")]
    Walk {
        /// The workspace root.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A path in the workspace is not valid UTF-8.
    #[error("path `{}` in workspace is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The path.
        path: std::path::PathBuf,
    },

    /// A matching file was not in the expected layout.
    #[error("test source `{path}` didn't match expected format")]
    UnexpectedLayout {
        /// The path, relative to the workspace.
        path: Utf8PathBuf,
    },
}

/// An error that occurred while writing split files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteSplitsError {
    /// The output directory could not be created.
    #[error("error creating splits directory `{path}`")]
    CreateDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The output directory could not be listed.
    #[error("error reading splits directory `{path}`")]
    ReadDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A stale split file from a previous run could not be removed.
    #[error("error removing stale split file `{path}`")]
    RemoveStale {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A split file could not be written.
    #[error("error writing split file `{path}`")]
    Write {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: atomicwrites::Error<io::Error>,
    },
}
