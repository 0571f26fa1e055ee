// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read test cases out of JUnit/XUnit XML.

use crate::{CaseResult, CaseStatus, ReportReadError};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::{io::BufRead, time::Duration};

static TESTSUITE_TAG: &[u8] = b"testsuite";
static TESTCASE_TAG: &[u8] = b"testcase";
static FAILURE_TAG: &[u8] = b"failure";
static ERROR_TAG: &[u8] = b"error";
static SKIPPED_TAG: &[u8] = b"skipped";

static NAME_ATTR: &[u8] = b"name";
static CLASSNAME_ATTR: &[u8] = b"classname";
static TIME_ATTR: &[u8] = b"time";
static ENCLOSING_BLOCKS_ATTR: &[u8] = b"enclosing-blocks";

/// Reads all test cases from a JUnit/XUnit XML document.
///
/// * `time` attributes are in seconds, and are truncated to whole milliseconds. A case without a
///   `time` attribute took no time.
/// * A case without a `classname` attribute is attributed to a class named after its innermost
///   enclosing `testsuite`.
/// * An `enclosing-blocks` attribute (a comma-separated list of pipeline block ids, innermost
///   first) on a `testsuite` is inherited by the cases within it. A `testcase` may override it
///   with its own attribute.
///
/// Any elements other than `testsuite`, `testcase`, and the `failure`, `error` and `skipped`
/// status markers are ignored.
pub fn read_junit_cases(reader: impl BufRead) -> Result<Vec<CaseResult>, ReportReadError> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut suites: Vec<SuiteContext> = Vec::new();
    let mut pending: Option<CaseResult> = None;
    let mut cases = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => match start.local_name().as_ref() {
                name if name == TESTSUITE_TAG => {
                    let context = SuiteContext::new(&start, suites.last())?;
                    suites.push(context);
                }
                name if name == TESTCASE_TAG => {
                    pending = Some(read_case(&start, suites.last())?);
                }
                name => {
                    if let Some(case) = &mut pending {
                        apply_status_marker(name, case);
                    }
                }
            },
            Event::Empty(start) => match start.local_name().as_ref() {
                name if name == TESTCASE_TAG => {
                    cases.push(read_case(&start, suites.last())?);
                }
                name => {
                    if let Some(case) = &mut pending {
                        apply_status_marker(name, case);
                    }
                }
            },
            Event::End(end) => match end.local_name().as_ref() {
                name if name == TESTSUITE_TAG => {
                    suites.pop();
                }
                name if name == TESTCASE_TAG => {
                    cases.extend(pending.take());
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(cases)
}

#[derive(Debug)]
struct SuiteContext {
    name: Option<String>,
    enclosing_blocks: Vec<String>,
}

impl SuiteContext {
    fn new(start: &BytesStart<'_>, parent: Option<&SuiteContext>) -> Result<Self, ReportReadError> {
        let mut name = None;
        let mut enclosing_blocks = None;
        for attr in start.attributes() {
            let attr = attr?;
            match attr.key.local_name().as_ref() {
                key if key == NAME_ATTR => name = Some(attr.unescape_value()?.into_owned()),
                key if key == ENCLOSING_BLOCKS_ATTR => {
                    enclosing_blocks = Some(parse_blocks(&attr.unescape_value()?));
                }
                _ => {}
            }
        }

        let enclosing_blocks = enclosing_blocks
            .or_else(|| parent.map(|parent| parent.enclosing_blocks.clone()))
            .unwrap_or_default();
        Ok(Self {
            name,
            enclosing_blocks,
        })
    }
}

fn read_case(
    start: &BytesStart<'_>,
    suite: Option<&SuiteContext>,
) -> Result<CaseResult, ReportReadError> {
    let mut name = None;
    let mut class_name = None;
    let mut time = None;
    let mut enclosing_blocks = None;
    for attr in start.attributes() {
        let attr = attr?;
        match attr.key.local_name().as_ref() {
            key if key == NAME_ATTR => name = Some(attr.unescape_value()?.into_owned()),
            key if key == CLASSNAME_ATTR => {
                class_name = Some(attr.unescape_value()?.into_owned());
            }
            key if key == TIME_ATTR => time = Some(attr.unescape_value()?.into_owned()),
            key if key == ENCLOSING_BLOCKS_ATTR => {
                enclosing_blocks = Some(parse_blocks(&attr.unescape_value()?));
            }
            _ => {}
        }
    }

    let name = name.ok_or(ReportReadError::MissingCaseName)?;
    let class_name = class_name
        .or_else(|| suite.and_then(|suite| suite.name.clone()))
        .unwrap_or_default();
    let duration = match time {
        Some(value) => parse_time(&value).ok_or_else(|| ReportReadError::InvalidTime {
            case_name: name.clone(),
            value,
        })?,
        None => Duration::ZERO,
    };
    let enclosing_blocks = enclosing_blocks
        .or_else(|| suite.map(|suite| suite.enclosing_blocks.clone()))
        .unwrap_or_default();

    let mut case = CaseResult::new(class_name, name);
    case.set_duration(duration)
        .set_enclosing_blocks(enclosing_blocks);
    Ok(case)
}

fn apply_status_marker(tag: &[u8], case: &mut CaseResult) {
    let status = match tag {
        tag if tag == FAILURE_TAG => CaseStatus::Failed,
        tag if tag == ERROR_TAG => CaseStatus::Errored,
        tag if tag == SKIPPED_TAG => CaseStatus::Skipped,
        _ => return,
    };
    case.set_status(status);
}

fn parse_blocks(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses a number of seconds, truncating to whole milliseconds.
///
/// Some reporters emit thousands separators, e.g. `1,234.5`.
fn parse_time(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().replace(',', "").parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_millis((secs * 1000.0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn reads_nested_suites() {
        let xml = indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <testsuites name="run">
                <testsuite name="org.example.FooTest" enclosing-blocks="12,3">
                    <testcase name="testOne" classname="org.example.FooTest" time="1.5"/>
                    <testcase name="testTwo" classname="org.example.FooTest" time="0.0109">
                        <failure message="boom">stack trace</failure>
                    </testcase>
                    <testcase name="testThree" enclosing-blocks="14">
                        <skipped/>
                    </testcase>
                </testsuite>
                <testsuite name="BarTest">
                    <testcase name="testBar" classname="BarTest">
                        <error type="java.lang.NullPointerException"/>
                        <system-out>some output</system-out>
                    </testcase>
                </testsuite>
            </testsuites>
        "#};

        let cases = read_junit_cases(xml.as_bytes()).expect("valid JUnit XML");
        let summary: Vec<_> = cases
            .iter()
            .map(|case| {
                (
                    case.class_name.as_str(),
                    case.name.as_str(),
                    case.duration.as_millis(),
                    case.status,
                    case.enclosing_blocks.join(","),
                )
            })
            .collect();
        assert_eq!(
            summary,
            [
                (
                    "org.example.FooTest",
                    "testOne",
                    1500,
                    CaseStatus::Passed,
                    "12,3".to_owned()
                ),
                (
                    "org.example.FooTest",
                    "testTwo",
                    10,
                    CaseStatus::Failed,
                    "12,3".to_owned()
                ),
                (
                    "org.example.FooTest",
                    "testThree",
                    0,
                    CaseStatus::Skipped,
                    "14".to_owned()
                ),
                ("BarTest", "testBar", 0, CaseStatus::Errored, String::new()),
            ]
        );
    }

    #[test]
    fn inner_suite_inherits_blocks() {
        let xml = indoc! {r#"
            <testsuite name="outer" enclosing-blocks="5">
                <testsuite name="inner">
                    <testcase name="t" classname="a.B"/>
                </testsuite>
            </testsuite>
        "#};
        let cases = read_junit_cases(xml.as_bytes()).expect("valid JUnit XML");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].enclosing_blocks, ["5"]);
    }

    #[test]
    fn missing_case_name_is_an_error() {
        let xml = r#"<testsuite name="s"><testcase classname="a.B"/></testsuite>"#;
        let error = read_junit_cases(xml.as_bytes()).expect_err("name is required");
        assert!(
            matches!(error, ReportReadError::MissingCaseName),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn invalid_time_is_an_error() {
        let xml = r#"<testsuite name="s"><testcase name="t" time="-1"/></testsuite>"#;
        let error = read_junit_cases(xml.as_bytes()).expect_err("negative time");
        match error {
            ReportReadError::InvalidTime { case_name, value } => {
                assert_eq!(case_name, "t");
                assert_eq!(value, "-1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test_case("1.5", Some(1500); "fractional")]
    #[test_case("0.0109", Some(10); "truncated")]
    #[test_case("1,234.5", Some(1_234_500); "thousands separator")]
    #[test_case(" 2 ", Some(2000); "whitespace")]
    #[test_case("-0.5", None; "negative")]
    #[test_case("NaN", None; "nan")]
    #[test_case("abc", None; "garbage")]
    fn time_parsing(input: &str, expected_millis: Option<u64>) {
        assert_eq!(parse_time(input), expected_millis.map(Duration::from_millis));
    }
}
