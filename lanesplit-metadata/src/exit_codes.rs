// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `lanesplit` failures.
///
/// `lanesplit` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum LaneSplitExitCode {}

impl LaneSplitExitCode {
    /// No errors occurred and lanesplit exited normally.
    ///
    /// Falling back to a single lane that runs everything is not an error.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up a lanesplit invocation, for example an invalid
    /// configuration file or an unknown profile.
    pub const SETUP_ERROR: i32 = 96;

    /// The build history directory could not be read.
    pub const HISTORY_READ_ERROR: i32 = 97;

    /// Writing split files produced an error.
    pub const WRITE_SPLITS_ERROR: i32 = 98;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
