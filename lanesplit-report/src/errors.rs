// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// An error that occurs while reading JUnit XML.
///
/// Returned by [`read_junit_cases`](crate::read_junit_cases).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportReadError {
    /// The document is not well-formed XML.
    #[error("error parsing JUnit XML")]
    Xml(#[from] quick_xml::Error),

    /// An attribute could not be parsed.
    #[error("malformed attribute in JUnit XML")]
    Attribute(#[from] AttrError),

    /// A `testcase` element is missing its `name` attribute.
    #[error("`testcase` element is missing the `name` attribute")]
    MissingCaseName,

    /// A `time` attribute is not a non-negative number of seconds.
    #[error("invalid time `{value}` for test case `{case_name}`")]
    InvalidTime {
        /// The name of the test case.
        case_name: String,

        /// The value of the `time` attribute.
        value: String,
    },
}
