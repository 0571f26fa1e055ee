// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, WrapErr};
use std::{collections::BTreeMap, fmt::Write, fs, sync::Once};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Other test binaries may have installed a handler already.
        let _ = color_eyre::install();
    });
}

/// A single test case in a fixture build: (name, time in seconds, enclosing blocks).
#[derive(Clone, Copy, Debug)]
pub(crate) struct FixtureCase {
    pub(crate) name: &'static str,
    pub(crate) time: &'static str,
    pub(crate) blocks: Option<&'static str>,
}

impl FixtureCase {
    pub(crate) const fn new(name: &'static str, time: &'static str) -> Self {
        Self {
            name,
            time,
            blocks: None,
        }
    }

    pub(crate) const fn in_blocks(mut self, blocks: &'static str) -> Self {
        self.blocks = Some(blocks);
        self
    }
}

/// A build history directory populated on disk.
pub(crate) struct HistoryFixture {
    dir: Utf8TempDir,
}

impl HistoryFixture {
    pub(crate) fn new() -> Result<Self> {
        let dir = Utf8TempDir::new().wrap_err("failed to create temp dir")?;
        Ok(Self { dir })
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn set_change_target(&self, branch: &str, target: &str) -> Result<()> {
        self.write(
            &format!("branches/{branch}/branch.toml"),
            &format!("change-target = \"{target}\"\n"),
        )
    }

    pub(crate) fn add_build(
        &self,
        branch: &str,
        number: u64,
        build_toml: &str,
        classes: &BTreeMap<&str, Vec<FixtureCase>>,
    ) -> Result<()> {
        let build_dir = format!("branches/{branch}/builds/{number}");
        self.write(&format!("{build_dir}/build.toml"), build_toml)?;
        if !classes.is_empty() {
            self.write(
                &format!("{build_dir}/results/TEST-results.xml"),
                &junit_xml(classes),
            )?;
        }
        Ok(())
    }

    pub(crate) fn add_flow(&self, branch: &str, number: u64, flow_toml: &str) -> Result<()> {
        self.write(
            &format!("branches/{branch}/builds/{number}/flow.toml"),
            flow_toml,
        )
    }

    fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).wrap_err_with(|| format!("failed to create {parent}"))?;
        }
        fs::write(&path, contents).wrap_err_with(|| format!("failed to write {path}"))
    }
}

fn junit_xml(classes: &BTreeMap<&str, Vec<FixtureCase>>) -> String {
    let mut xml = String::from("<testsuites>\n  <testsuite name=\"fixture\">\n");
    for (class_name, cases) in classes {
        for case in cases {
            let blocks = case
                .blocks
                .map(|blocks| format!(" enclosing-blocks=\"{blocks}\""))
                .unwrap_or_default();
            writeln!(
                xml,
                "    <testcase classname=\"{class_name}\" name=\"{}\" time=\"{}\"{blocks}/>",
                case.name, case.time,
            )
            .expect("writing to a String is infallible");
        }
    }
    xml.push_str("  </testsuite>\n</testsuites>\n");
    xml
}

/// Creates a workspace containing the given files, each with placeholder contents.
pub(crate) fn workspace_with_files(files: &[&str]) -> Result<Utf8TempDir> {
    let dir = Utf8TempDir::new().wrap_err("failed to create temp dir")?;
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, "")?;
    }
    Ok(dir)
}

pub(crate) fn read_lines(path: &Utf8Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).wrap_err_with(|| format!("failed to read {path}"))?;
    Ok(contents.lines().map(str::to_owned).collect())
}
