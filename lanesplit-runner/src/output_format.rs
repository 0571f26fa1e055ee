// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output formats for split plans.

use crate::{sink::DirSink, splitter::SplitPlan};
use owo_colors::{OwoColorize, Style};
use serde::Serialize;
use std::io;

/// Output formats for split plans.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    /// A human-readable line per lane.
    Human,

    /// Machine-readable output format.
    Serializable(SerializableFormat),
}

/// A serialized, machine-readable output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SerializableFormat {
    /// JSON with no whitespace.
    Json,
    /// JSON, prettified.
    JsonPretty,
}

impl SerializableFormat {
    /// Write this data in the given format to the writer.
    pub fn to_writer(
        self,
        value: &impl Serialize,
        writer: impl io::Write,
    ) -> serde_json::Result<()> {
        match self {
            SerializableFormat::Json => serde_json::to_writer(writer, value),
            SerializableFormat::JsonPretty => serde_json::to_writer_pretty(writer, value),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Styles {
    pub(crate) path: Style,
    pub(crate) count: Style,
}

impl Styles {
    pub(crate) fn colorize(&mut self) {
        self.path = Style::new().cyan();
        self.count = Style::new().bold();
    }
}

/// Writes a [`SplitPlan`] in a given format.
#[derive(Clone, Debug)]
pub struct PlanWriter<'a> {
    plan: &'a SplitPlan,
    sink: Option<&'a DirSink>,
    styles: Styles,
}

impl<'a> PlanWriter<'a> {
    /// Creates a new writer. If `sink` is provided, the paths lanes were written to are included.
    pub fn new(plan: &'a SplitPlan, sink: Option<&'a DirSink>) -> Self {
        Self {
            plan,
            sink,
            styles: Styles::default(),
        }
    }

    /// Colorizes human-readable output.
    pub fn colorize(&mut self) -> &mut Self {
        self.styles.colorize();
        self
    }

    /// Writes the plan to `writer`.
    pub fn write(&self, format: OutputFormat, mut writer: impl io::Write) -> io::Result<()> {
        match format {
            OutputFormat::Human => self.write_human(&mut writer),
            OutputFormat::Serializable(format) => {
                format.to_writer(&self.plan.to_summary(self.sink), &mut writer)?;
                writeln!(writer)
            }
        }
    }

    fn write_human(&self, writer: &mut impl io::Write) -> io::Result<()> {
        for (lane, pattern) in self.plan.patterns().iter().enumerate() {
            let count = pattern.patterns().len();
            let noun = if count == 1 { "pattern" } else { "patterns" };
            let verb = if pattern.includes() {
                "includes"
            } else {
                "excludes"
            };
            match self.sink {
                Some(sink) => write!(
                    writer,
                    "{}",
                    sink.path_for(lane, pattern).style(self.styles.path)
                )?,
                None => write!(writer, "lane {lane}")?,
            }
            writeln!(
                writer,
                ": {verb} {} {noun}",
                count.style(self.styles.count)
            )?;
        }
        Ok(())
    }
}
