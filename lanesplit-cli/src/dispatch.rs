// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lanesplit_metadata::LaneSplitExitCode;
use lanesplit_runner::{
    config::LaneSplitConfig,
    estimate::FsWorkspace,
    granularity::GranularityMode,
    history::BuildHistoryStore,
    output_format::{OutputFormat, PlanWriter, SerializableFormat},
    parallelism::Parallelism,
    sink::{DirSink, SplitSink},
    splitter::TestSplitter,
};
use std::io::Write;

/// Split a test suite into balanced parallel lanes.
///
/// lanesplit reads test results from previous builds, groups them at the chosen granularity, and
/// writes one include or exclude pattern file per lane.
#[derive(Debug, Parser)]
#[command(version, bin_name = "lanesplit", styles = clap_styles::style())]
pub struct LaneSplitApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl LaneSplitApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Split(opts) => opts.exec(output, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute test splits and write one pattern file per lane
    Split(SplitOpts),
}

#[derive(Debug, Args)]
struct SplitOpts {
    /// Root of the build history
    #[arg(long, value_name = "DIR", env = "LANESPLIT_HISTORY_DIR")]
    history_dir: Utf8PathBuf,

    /// Branch the current build belongs to
    #[arg(long, value_name = "NAME", env = "LANESPLIT_BRANCH")]
    branch: String,

    /// Number of the current build [default: one past the branch's latest build]
    #[arg(long, value_name = "NUMBER")]
    build: Option<u64>,

    /// Branch a change request merges into, overriding branch.toml
    #[arg(long, value_name = "BRANCH")]
    change_target: Option<String>,

    /// Workspace to search for test sources and config [default: current directory]
    #[arg(long, value_name = "DIR")]
    workspace: Option<Utf8PathBuf>,

    /// Directory to write split files to [default: the profile's splits-dir]
    #[arg(long, value_name = "DIR")]
    out_dir: Option<Utf8PathBuf>,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(flatten)]
    split_opts: SplitterOpts,

    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormat,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: workspace-root/.config/lanesplit.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Profile to use
    #[arg(long, short = 'P', value_name = "PROFILE", env = "LANESPLIT_PROFILE")]
    profile: Option<String>,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Split options")]
struct SplitterOpts {
    /// Number of lanes: count:N or time:MINUTES
    #[arg(long, value_name = "SPEC")]
    parallelism: Option<Parallelism>,

    /// Unit tests are split by: class, case, qualified-case, java-case or parameterized-case
    #[arg(long, value_name = "MODE")]
    granularity: Option<GranularityMode>,

    /// Give every lane but the first an inclusion list
    #[arg(long)]
    generate_inclusions: bool,

    /// Only use results recorded inside the pipeline stage with this label
    #[arg(long, value_name = "LABEL")]
    stage: Option<String>,

    /// Estimate test classes from source files if no reference build is found
    #[arg(long)]
    estimate_tests_from_files: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum MessageFormat {
    #[default]
    Human,
    Json,
    JsonPretty,
}

impl MessageFormat {
    fn to_output_format(self) -> OutputFormat {
        match self {
            Self::Human => OutputFormat::Human,
            Self::Json => OutputFormat::Serializable(SerializableFormat::Json),
            Self::JsonPretty => OutputFormat::Serializable(SerializableFormat::JsonPretty),
        }
    }
}

impl SplitOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let workspace_root = match self.workspace {
            Some(workspace) => workspace,
            None => current_dir()?,
        };

        let config = LaneSplitConfig::from_sources(
            &workspace_root,
            self.config_opts.config_file.as_deref(),
        )?;
        let profile = config.profile(
            self.config_opts
                .profile
                .as_deref()
                .unwrap_or(LaneSplitConfig::DEFAULT_PROFILE),
        )?;

        let mut splitter = profile.splitter();
        self.split_opts.apply(&mut splitter);
        tracing::debug!(
            "splitting with profile `{}`: parallelism {}, granularity {}",
            profile.name(),
            splitter.parallelism(),
            splitter.granularity(),
        );

        let store = BuildHistoryStore::open(&self.history_dir)?;
        let current = store
            .current_build(&self.branch, self.build)?
            .with_change_target(self.change_target);
        let lister = FsWorkspace::new(&workspace_root);
        let plan = splitter.find_test_splits(&current, Some(&lister));

        let out_dir = self.out_dir.unwrap_or_else(|| profile.splits_dir());
        let mut sink = DirSink::new(&out_dir);
        sink.write_splits(plan.patterns())
            .map_err(|err| ExpectedError::WriteSplitsError { out_dir, err })?;

        let mut writer = PlanWriter::new(&plan, Some(&sink));
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            writer.colorize();
        }
        let mut stdout = output_writer.stdout_writer();
        writer
            .write(self.message_format.to_output_format(), &mut stdout)
            .and_then(|()| stdout.flush())
            .map_err(|err| ExpectedError::WriteOutputError { err })?;

        Ok(LaneSplitExitCode::OK)
    }
}

impl SplitterOpts {
    fn apply(self, splitter: &mut TestSplitter) {
        if let Some(parallelism) = self.parallelism {
            splitter.set_parallelism(parallelism);
        }
        if let Some(granularity) = self.granularity {
            splitter.set_granularity(granularity);
        }
        if self.generate_inclusions {
            splitter.set_generate_inclusions(true);
        }
        if self.stage.is_some() {
            splitter.set_stage(self.stage);
        }
        if self.estimate_tests_from_files {
            splitter.set_estimate_tests_from_files(true);
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::GetCurrentDirFailed { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })
}
