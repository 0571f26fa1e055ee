// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisting lane patterns.

use crate::{errors::WriteSplitsError, patterns::InclusionExclusionPattern};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::{self, Write};
use tracing::debug;

/// Persists the patterns for each lane.
pub trait SplitSink {
    /// Writes `patterns`, one entry per lane in lane order.
    fn write_splits(&mut self, patterns: &[InclusionExclusionPattern])
    -> Result<(), WriteSplitsError>;
}

/// Writes each lane's patterns to `split.<lane>.<include|exclude>.txt` within a directory.
///
/// Split files left over from a previous run are removed first.
#[derive(Clone, Debug)]
pub struct DirSink {
    dir: Utf8PathBuf,
}

impl DirSink {
    /// Creates a new sink writing into `dir`. The directory is created if necessary.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the output directory.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the path `pattern` is written to, for lane `lane`.
    pub fn path_for(&self, lane: usize, pattern: &InclusionExclusionPattern) -> Utf8PathBuf {
        self.dir.join(pattern.file_name(lane))
    }

    fn remove_stale(&self) -> Result<(), WriteSplitsError> {
        let entries = self
            .dir
            .read_dir_utf8()
            .map_err(|err| WriteSplitsError::ReadDir {
                path: self.dir.clone(),
                err,
            })?;
        for entry in entries {
            let entry = entry.map_err(|err| WriteSplitsError::ReadDir {
                path: self.dir.clone(),
                err,
            })?;
            if !is_split_file_name(entry.file_name()) {
                continue;
            }
            debug!("removing stale split file {}", entry.path());
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(WriteSplitsError::RemoveStale {
                        path: entry.path().to_owned(),
                        err,
                    });
                }
            }
        }
        Ok(())
    }
}

impl SplitSink for DirSink {
    fn write_splits(
        &mut self,
        patterns: &[InclusionExclusionPattern],
    ) -> Result<(), WriteSplitsError> {
        std::fs::create_dir_all(&self.dir).map_err(|err| WriteSplitsError::CreateDir {
            path: self.dir.clone(),
            err,
        })?;
        self.remove_stale()?;

        for (lane, pattern) in patterns.iter().enumerate() {
            let path = self.path_for(lane, pattern);
            AtomicFile::new(&path, OverwriteBehavior::AllowOverwrite)
                .write(|file| {
                    let mut writer = io::BufWriter::new(file);
                    for line in pattern.patterns() {
                        writeln!(writer, "{line}")?;
                    }
                    writer.flush()
                })
                .map_err(|err| WriteSplitsError::Write {
                    path: path.clone(),
                    err,
                })?;
            debug!("wrote {} patterns to {path}", pattern.patterns().len());
        }
        Ok(())
    }
}

fn is_split_file_name(name: &str) -> bool {
    name.strip_prefix("split.")
        .and_then(|rest| rest.strip_suffix(".txt"))
        .is_some()
}
