// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use indoc::indoc;
use lanesplit_runner::{
    config::LaneSplitConfig,
    estimate::FsWorkspace,
    granularity::GranularityMode,
    history::{BuildHistoryStore, ReferenceCandidate},
    parallelism::Parallelism,
    sink::{DirSink, SplitSink},
    splitter::{PlanSource, TestSplitter},
};
use maplit::btreemap;
use pretty_assertions::assert_eq;

const SUCCESS: &str = "status = \"success\"\n";

#[test]
fn splits_from_most_recent_successful_build() -> Result<()> {
    test_init();

    let history = HistoryFixture::new()?;
    history.add_build(
        "main",
        1,
        SUCCESS,
        &btreemap! {
            "org.example.AlphaTest" => vec![FixtureCase::new("a", "5.0"), FixtureCase::new("b", "1.0")],
            "org.example.BetaTest" => vec![FixtureCase::new("a", "4.0")],
            "org.example.GammaTest" => vec![FixtureCase::new("a", "3.0")],
            "DeltaTest" => vec![FixtureCase::new("a", "2.5")],
        },
    )?;
    // Newer builds that must be skipped.
    history.add_build(
        "main",
        2,
        "status = \"failure\"\n",
        &btreemap! { "org.example.AlphaTest" => vec![FixtureCase::new("a", "100.0")] },
    )?;
    history.add_build("main", 3, "status = \"success\"\nbuilding = true\n", &btreemap! {})?;

    let store = BuildHistoryStore::open(history.root())?;
    let current = store.current_build("main", None)?;
    assert_eq!(current.display_name(), "main #4");

    let plan = TestSplitter::new(Parallelism::Count(2)).find_test_splits(&current, None);
    assert_eq!(
        plan.source(),
        &PlanSource::Reference {
            build: "main #1".to_owned(),
            stage: None,
        }
    );
    let stats = plan.stats().expect("tests were partitioned");
    // Lane 0: Alpha (6000) and Delta (2500). Lane 1: Beta (4000) and Gamma (3000).
    assert_eq!(stats.total_ms, 15_500);
    assert_eq!(stats.max_ms, 8_500);
    assert_eq!(stats.min_ms, 7_000);

    let out = history.root().join("out");
    let mut sink = DirSink::new(&out);
    sink.write_splits(plan.patterns())?;

    assert_eq!(
        read_lines(&out.join("split.0.exclude.txt"))?,
        [
            "org/example/BetaTest.java",
            "org/example/BetaTest.class",
            "org/example/GammaTest.java",
            "org/example/GammaTest.class",
        ]
    );
    assert_eq!(
        read_lines(&out.join("split.1.exclude.txt"))?,
        [
            "org/example/AlphaTest.java",
            "org/example/AlphaTest.class",
            "DeltaTest.java",
            "DeltaTest.class",
        ]
    );

    Ok(())
}

#[test]
fn change_request_falls_back_to_target_branch() -> Result<()> {
    test_init();

    let history = HistoryFixture::new()?;
    history.set_change_target("pr-12", "main")?;
    history.add_build("pr-12", 1, "status = \"aborted\"\n", &btreemap! {})?;
    history.add_build(
        "main",
        7,
        SUCCESS,
        &btreemap! {
            "FooTest" => vec![FixtureCase::new("one", "1"), FixtureCase::new("two", "2")],
        },
    )?;
    history.add_build(
        "main",
        8,
        "status = \"unstable\"\ndisplay-name = \"main nightly\"\n",
        &btreemap! {
            "FooTest" => vec![FixtureCase::new("one", "1"), FixtureCase::new("two", "2")],
            "BarTest" => vec![FixtureCase::new("one", "0.5")],
        },
    )?;

    let store = BuildHistoryStore::open(history.root())?;
    let current = store.current_build("pr-12", None)?;
    let mut splitter = TestSplitter::new(Parallelism::Count(3));
    splitter
        .set_granularity(GranularityMode::QualifiedCase)
        .set_generate_inclusions(true);
    let plan = splitter.find_test_splits(&current, None);

    assert_eq!(
        plan.source(),
        &PlanSource::Reference {
            build: "main nightly".to_owned(),
            stage: None,
        }
    );
    let patterns: Vec<_> = plan
        .patterns()
        .iter()
        .map(|pattern| (pattern.includes(), pattern.patterns().to_vec()))
        .collect();
    assert_eq!(
        patterns,
        [
            (false, vec!["FooTest#one".to_owned(), "BarTest#one".to_owned()]),
            (true, vec!["FooTest#one".to_owned()]),
            (true, vec!["BarTest#one".to_owned()]),
        ]
    );

    Ok(())
}

#[test]
fn stage_narrows_reference_results() -> Result<()> {
    test_init();

    let history = HistoryFixture::new()?;
    history.add_build(
        "main",
        1,
        SUCCESS,
        &btreemap! {
            "IntegrationTest" => vec![FixtureCase::new("slow", "60").in_blocks("9,4")],
            "UnitTest" => vec![
                FixtureCase::new("a", "2").in_blocks("6,4"),
                FixtureCase::new("b", "1").in_blocks("6,4"),
            ],
        },
    )?;
    history.add_flow(
        "main",
        1,
        indoc! {r#"
            [[nodes]]
            id = "4"
            label = "Parallel"

            [[nodes]]
            id = "6"
            label = "Unit"
            parents = ["4"]

            [[nodes]]
            id = "9"
            label = "Integration"
            parents = ["4"]

            [[nodes]]
            id = "10"
            parents = ["6", "9"]
        "#},
    )?;

    let store = BuildHistoryStore::open(history.root())?;
    let current = store.current_build("main", None)?;
    let mut splitter = TestSplitter::new(Parallelism::Count(4));
    splitter
        .set_granularity(GranularityMode::Case)
        .set_stage(Some("Unit".to_owned()));
    let plan = splitter.find_test_splits(&current, None);

    let stats = plan.stats().expect("tests were partitioned");
    assert_eq!(stats.entity_count, 2);
    assert_eq!(stats.total_ms, 3_000);
    assert_eq!(plan.patterns().len(), 2);
    assert_eq!(plan.patterns()[0].patterns(), ["b"]);
    assert_eq!(plan.patterns()[1].patterns(), ["a"]);

    // An unknown stage leaves the results alone.
    splitter.set_stage(Some("Deploy".to_owned()));
    let plan = splitter.find_test_splits(&current, None);
    assert_eq!(plan.stats().map(|stats| stats.entity_count), Some(3));

    Ok(())
}

#[test]
fn profile_drives_estimation() -> Result<()> {
    test_init();

    let workspace = workspace_with_files(&[
        ".config/lanesplit.toml",
        "core/src/test/java/org/example/ParserTest.java",
        "core/src/test/java/org/example/TestLexer.java",
        "core/src/test/java/org/example/AllTests.java",
        "core/src/test/java/org/example/ScannerTestCase.java",
        "core/src/test/java/org/example/Helper.java",
        "core/src/main/java/org/example/MainTest.java",
    ])?;
    std::fs::write(
        workspace.path().join(LaneSplitConfig::CONFIG_PATH),
        indoc! {r#"
            [profile.ci]
            parallelism = "time:1"
            estimate-tests-from-files = true
            splits-dir = "splits"
        "#},
    )?;

    let config = LaneSplitConfig::from_sources(workspace.path(), None)?;
    let profile = config.profile("ci")?;
    assert_eq!(profile.splits_dir(), workspace.path().join("splits"));

    let history = HistoryFixture::new()?;
    let store = BuildHistoryStore::open(history.root())?;
    let current = store.current_build("main", None)?;
    let lister = FsWorkspace::new(workspace.path());
    let plan = profile.splitter().find_test_splits(&current, Some(&lister));

    assert_eq!(plan.source(), &PlanSource::Estimate);
    let stats = plan.stats().expect("tests were partitioned");
    assert_eq!(stats.entity_count, 4);
    assert_eq!(stats.total_ms, 40);
    // 40ms fits into a single one-minute lane.
    assert_eq!(plan.patterns().len(), 1);
    ensure!(
        plan.patterns()[0].patterns().is_empty(),
        "a single lane excludes nothing"
    );

    let mut sink = DirSink::new(profile.splits_dir());
    sink.write_splits(plan.patterns())?;
    let summary = plan.to_summary(Some(&sink));
    assert_eq!(
        summary.lanes[0].path.as_deref(),
        Some(workspace.path().join("splits/split.0.exclude.txt").as_path())
    );
    assert_eq!(
        read_lines(&workspace.path().join("splits/split.0.exclude.txt"))?,
        Vec::<String>::new()
    );

    Ok(())
}

#[test]
fn empty_history_runs_everything() -> Result<()> {
    test_init();

    let history = HistoryFixture::new()?;
    history.add_build("main", 1, SUCCESS, &btreemap! {})?;

    let store = BuildHistoryStore::open(history.root())?;
    let current = store.current_build("main", Some(2))?;
    let plan = TestSplitter::new(Parallelism::Count(4)).find_test_splits(&current, None);

    assert_eq!(plan.source(), &PlanSource::None);
    assert_eq!(plan.patterns().len(), 1);
    assert!(!plan.patterns()[0].includes());
    assert!(plan.patterns()[0].patterns().is_empty());

    Ok(())
}
