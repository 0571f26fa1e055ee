// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flattening result trees into test entities at a chosen granularity.
//!
//! A [`GranularityMode`] is the configurable choice, and builds a [`TestMode`] that does the work.
//! The relationship between the two is the same as between `std`'s `BuildHasher` and `Hasher`.

use crate::{
    entity::{TestEntity, TestEntityMap},
    errors::{EstimationError, GranularityModeParseError},
    estimate::{WorkspaceLister, estimate_java_classes},
};
use lanesplit_report::{CaseResult, ClassResult, ResultNode, ResultTree};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The unit tests are split by.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GranularityMode {
    /// One entity per test class, keyed by the fully qualified class name.
    #[default]
    Class,

    /// One entity per test case, keyed by the case name alone.
    Case,

    /// One entity per test case, keyed by `class#case`.
    QualifiedCase,

    /// One entity per Java test method, keyed by `class#case` with any parameter suffix removed.
    ///
    /// All parameterizations of a method are summed into one entity.
    JavaCase,

    /// One entity per parameterized Java test case, keyed by `class#case[params]`.
    ParameterizedCase,
}

impl GranularityMode {
    /// Returns string representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &[
            "class",
            "case",
            "qualified-case",
            "java-case",
            "parameterized-case",
        ]
    }

    /// Returns the string representation of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Case => "case",
            Self::QualifiedCase => "qualified-case",
            Self::JavaCase => "java-case",
            Self::ParameterizedCase => "parameterized-case",
        }
    }

    /// Creates a new `TestMode` for this granularity.
    pub fn build(self) -> Box<dyn TestMode> {
        match self {
            Self::Class => Box::new(ClassMode),
            Self::Case => Box::new(CaseMode {
                key: CaseKey::Name,
                estimates: false,
            }),
            Self::QualifiedCase => Box::new(CaseMode {
                key: CaseKey::Qualified,
                estimates: false,
            }),
            Self::JavaCase => Box::new(CaseMode {
                key: CaseKey::QualifiedWithoutParameters,
                estimates: true,
            }),
            Self::ParameterizedCase => Box::new(CaseMode {
                key: CaseKey::Qualified,
                estimates: true,
            }),
        }
    }
}

impl fmt::Display for GranularityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GranularityMode {
    type Err = GranularityModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "class" => Self::Class,
            "case" => Self::Case,
            "qualified-case" => Self::QualifiedCase,
            "java-case" => Self::JavaCase,
            "parameterized-case" => Self::ParameterizedCase,
            other => return Err(GranularityModeParseError::new(other)),
        };
        Ok(mode)
    }
}

/// Turns class results into test entities.
pub trait TestMode: fmt::Debug {
    /// Adds the entities for a single class to `entities`.
    fn entities_for_class(&self, class: &ClassResult, entities: &mut TestEntityMap);

    /// Discovers entities from the workspace, for use when no previous results exist.
    ///
    /// The default implementation discovers nothing.
    fn estimate(&self, lister: &dyn WorkspaceLister) -> Result<TestEntityMap, EstimationError> {
        let _ = lister;
        Ok(TestEntityMap::new())
    }

    /// A plural noun describing the entities, e.g. "classes".
    fn word(&self) -> &'static str;
}

/// Flattens a result tree into entities using `mode`.
pub fn extract(tree: &ResultTree, mode: &dyn TestMode) -> TestEntityMap {
    let mut entities = TestEntityMap::new();
    let mut stack: Vec<&ResultNode> = tree.root().children.iter().rev().collect();
    while let Some(node) = stack.pop() {
        match node {
            ResultNode::Tabulated(tabulated) => stack.extend(tabulated.children.iter().rev()),
            ResultNode::Class(class) => mode.entities_for_class(class, &mut entities),
        }
    }
    entities
}

#[derive(Clone, Copy, Debug)]
struct ClassMode;

impl TestMode for ClassMode {
    fn entities_for_class(&self, class: &ClassResult, entities: &mut TestEntityMap) {
        let duration_ms = u64::try_from(class.duration().as_millis()).unwrap_or(u64::MAX);
        entities.insert_replacing(TestEntity::class(class.full_name(), duration_ms));
    }

    fn estimate(&self, lister: &dyn WorkspaceLister) -> Result<TestEntityMap, EstimationError> {
        estimate_java_classes(lister)
    }

    fn word(&self) -> &'static str {
        "classes"
    }
}

#[derive(Clone, Copy, Debug)]
enum CaseKey {
    Name,
    Qualified,
    QualifiedWithoutParameters,
}

impl CaseKey {
    fn key_for(self, class: &ClassResult, case: &CaseResult) -> String {
        match self {
            Self::Name => case.name.clone(),
            Self::Qualified => format!("{}#{}", class.full_name(), case.name),
            Self::QualifiedWithoutParameters => {
                format!("{}#{}", class.full_name(), strip_parameters(&case.name))
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct CaseMode {
    key: CaseKey,
    estimates: bool,
}

impl TestMode for CaseMode {
    fn entities_for_class(&self, class: &ClassResult, entities: &mut TestEntityMap) {
        for case in class.cases() {
            let duration_ms = u64::try_from(case.duration.as_millis()).unwrap_or(u64::MAX);
            entities.insert_merging(TestEntity::case(
                self.key.key_for(class, case),
                duration_ms,
            ));
        }
    }

    fn estimate(&self, lister: &dyn WorkspaceLister) -> Result<TestEntityMap, EstimationError> {
        if self.estimates {
            estimate_java_classes(lister)
        } else {
            Ok(TestEntityMap::new())
        }
    }

    fn word(&self) -> &'static str {
        "cases"
    }
}

/// Removes a trailing `[...]` parameter suffix from a case name.
fn strip_parameters(name: &str) -> &str {
    if name.ends_with(']')
        && let Some(index) = name.find('[')
    {
        return &name[..index];
    }
    name
}
