// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for lanesplit.
//!
//! Configuration is layered: the embedded default config comes first, followed by either
//! `.config/lanesplit.toml` within the workspace or an explicitly provided config file.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound},
    granularity::GranularityMode,
    history::DEFAULT_SEARCH_DEPTH,
    parallelism::Parallelism,
    splitter::TestSplitter,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Handles warnings produced while reading configuration.
pub trait ConfigWarnings {
    /// Called with the keys in `config_file` that lanesplit doesn't recognize.
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        workspace_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    );
}

/// Logs configuration warnings with `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        workspace_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    ) {
        let mut unknown_str = String::new();
        if let [key] = unknown.iter().collect::<Vec<_>>().as_slice() {
            unknown_str.push_str("key: ");
            unknown_str.push_str(key);
        } else {
            unknown_str.push_str("keys:\n");
            for key in unknown {
                unknown_str.push_str("\n  - ");
                unknown_str.push_str(key);
            }
        }

        warn!(
            "in config file {}, ignoring unknown configuration {unknown_str}",
            config_file
                .strip_prefix(workspace_root)
                .unwrap_or(config_file),
        );
    }
}

/// Overall configuration for lanesplit.
///
/// This is the root data structure for lanesplit configuration. Most runner-specific configuration
/// is managed through [profiles](LaneSplitProfile), obtained through the [`profile`](Self::profile)
/// method.
#[derive(Clone, Debug)]
pub struct LaneSplitConfig {
    workspace_root: Utf8PathBuf,
    inner: LaneSplitConfigImpl,
}

impl LaneSplitConfig {
    /// The default location of the config within the workspace: `.config/lanesplit.toml`.
    pub const CONFIG_PATH: &'static str = ".config/lanesplit.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the lanesplit config from the given file, or if not specified from
    /// `.config/lanesplit.toml` in the workspace root.
    ///
    /// An explicitly specified file must exist. The default location is optional.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(workspace_root, config_file, &mut DefaultConfigWarnings)
    }

    /// Reads the lanesplit config, reporting warnings to `warnings`.
    pub fn from_sources_with_warnings(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (
                file.to_owned(),
                File::new(file.as_str(), FileFormat::Toml),
            ),
            None => {
                let file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(file.as_str(), FileFormat::Toml).required(false);
                (file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &workspace_root, &unknown);
        }

        Ok(Self {
            workspace_root,
            inner,
        })
    }

    /// Returns the default lanesplit config.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        use itertools::Itertools;

        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");

        let mut unknown = BTreeSet::new();
        let inner: LaneSplitConfigImpl =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                unknown.insert(path.to_string());
            })
            .expect("default config is always valid");

        // The default config is embedded in the binary, so unknown keys are a bug.
        assert!(
            unknown.is_empty(),
            "found unknown keys in default config: {}",
            unknown.iter().join(", ")
        );

        Self {
            workspace_root: workspace_root.into(),
            inner,
        }
    }

    /// Returns the workspace root this config was read for.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the maximum number of builds inspected per history walk.
    pub fn search_depth(&self) -> usize {
        self.inner.history.search_depth
    }

    /// Returns the profile with the given name, or an error if a profile was specified but not
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<LaneSplitProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = self.inner.profiles.get(name)?;
        Ok(LaneSplitProfile {
            name: name.to_owned(),
            workspace_root: &self.workspace_root,
            search_depth: self.search_depth(),
            default_profile: &self.inner.profiles.default,
            custom_profile,
        })
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(LaneSplitConfigImpl, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(ConfigParseErrorKind::BuildError)?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: LaneSplitConfigImpl =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // The config crate also reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(serde_path_to_error::Error::new(path, error))
            })?;

        Ok((config, ignored))
    }
}

/// A lanesplit profile that can be used to split tests.
///
/// Values not set in a custom profile are taken from the default profile.
#[derive(Clone, Debug)]
pub struct LaneSplitProfile<'cfg> {
    name: String,
    workspace_root: &'cfg Utf8Path,
    search_depth: usize,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl LaneSplitProfile<'_> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of lanes to split into.
    pub fn parallelism(&self) -> Parallelism {
        self.custom_profile
            .and_then(|profile| profile.parallelism)
            .unwrap_or(self.default_profile.parallelism)
    }

    /// Returns the unit tests are split by.
    pub fn granularity(&self) -> GranularityMode {
        self.custom_profile
            .and_then(|profile| profile.granularity)
            .unwrap_or(self.default_profile.granularity)
    }

    /// Returns true if lanes other than lane 0 should list the tests to run.
    pub fn generate_inclusions(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.generate_inclusions)
            .unwrap_or(self.default_profile.generate_inclusions)
    }

    /// Returns true if tests should be discovered from source files when no history is available.
    pub fn estimate_tests_from_files(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.estimate_tests_from_files)
            .unwrap_or(self.default_profile.estimate_tests_from_files)
    }

    /// Returns the pipeline stage results are narrowed to, if any.
    pub fn stage(&self) -> Option<&str> {
        self.custom_profile
            .and_then(|profile| profile.stage.as_deref())
            .or(self.default_profile.stage.as_deref())
    }

    /// Returns the directory split files are written to.
    ///
    /// Relative paths are resolved against the workspace root.
    pub fn splits_dir(&self) -> Utf8PathBuf {
        let dir = self
            .custom_profile
            .and_then(|profile| profile.splits_dir.as_deref())
            .unwrap_or(&self.default_profile.splits_dir);
        self.workspace_root.join(dir)
    }

    /// Returns a [`TestSplitter`] configured with this profile's settings.
    pub fn splitter(&self) -> TestSplitter {
        let mut splitter = TestSplitter::new(self.parallelism());
        splitter
            .set_granularity(self.granularity())
            .set_generate_inclusions(self.generate_inclusions())
            .set_estimate_tests_from_files(self.estimate_tests_from_files())
            .set_stage(self.stage().map(str::to_owned))
            .set_search_depth(self.search_depth);
        splitter
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LaneSplitConfigImpl {
    #[serde(default)]
    history: HistoryConfig,
    #[serde(rename = "profile")]
    profiles: ProfilesImpl,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HistoryConfig {
    search_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ProfilesImpl {
    #[serde(rename = "default")]
    default: DefaultProfileImpl,
    #[serde(flatten)]
    other: HashMap<String, CustomProfileImpl>,
}

impl ProfilesImpl {
    fn get(&self, profile: &str) -> Result<Option<&CustomProfileImpl>, ProfileNotFound> {
        let custom_profile = match profile {
            LaneSplitConfig::DEFAULT_PROFILE => None,
            other => Some(
                self.other
                    .get(other)
                    .ok_or_else(|| ProfileNotFound::new(profile, self.all_profiles()))?,
            ),
        };
        Ok(custom_profile)
    }

    fn all_profiles(&self) -> impl Iterator<Item = &str> {
        self.other
            .keys()
            .map(|key| key.as_str())
            .chain(std::iter::once(LaneSplitConfig::DEFAULT_PROFILE))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultProfileImpl {
    parallelism: Parallelism,
    granularity: GranularityMode,
    generate_inclusions: bool,
    estimate_tests_from_files: bool,
    #[serde(default)]
    stage: Option<String>,
    splits_dir: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    parallelism: Option<Parallelism>,
    #[serde(default)]
    granularity: Option<GranularityMode>,
    #[serde(default)]
    generate_inclusions: Option<bool>,
    #[serde(default)]
    estimate_tests_from_files: Option<bool>,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    splits_dir: Option<Utf8PathBuf>,
}
