// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use indexmap::IndexMap;
use std::time::Duration;

/// The package name given to classes that aren't in any package.
///
/// A class named `FooTest` (with no `.` in its name) is placed in this package.
pub const ROOT_PACKAGE: &str = "(root)";

/// A tree of test results from a single run.
///
/// The root of the tree is a [`TabulatedResult`] containing one tabulated node per package. Each
/// package contains [`ClassResult`] nodes, which in turn contain the individual cases.
#[derive(Clone, Debug)]
pub struct ResultTree {
    root: TabulatedResult,
    total_count: usize,
}

impl ResultTree {
    /// Creates an empty result tree.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            root: TabulatedResult::new(name),
            total_count: 0,
        }
    }

    /// Builds a result tree out of individual cases.
    ///
    /// Packages and classes appear in the order in which they're first seen.
    pub fn from_cases(name: impl Into<String>, cases: impl IntoIterator<Item = CaseResult>) -> Self {
        let mut packages: IndexMap<String, IndexMap<String, ClassResult>> = IndexMap::new();
        let mut total_count = 0;

        for case in cases {
            let (package, class_name) = split_class_name(&case.class_name);
            packages
                .entry(package.to_owned())
                .or_default()
                .entry(class_name.to_owned())
                .or_insert_with(|| ClassResult::new(package, class_name))
                .cases
                .push(case);
            total_count += 1;
        }

        let mut root = TabulatedResult::new(name);
        for (package, classes) in packages {
            let mut package_node = TabulatedResult::new(package);
            package_node
                .children
                .extend(classes.into_values().map(ResultNode::Class));
            root.children.push(ResultNode::Tabulated(package_node));
        }

        Self { root, total_count }
    }

    /// Merges several result trees into one, for example the trees read from several report files
    /// of the same run.
    pub fn merge(name: impl Into<String>, trees: impl IntoIterator<Item = ResultTree>) -> Self {
        Self::from_cases(name, trees.into_iter().flat_map(|tree| tree.into_cases()))
    }

    /// Returns the root node of the tree.
    pub fn root(&self) -> &TabulatedResult {
        &self.root
    }

    /// Returns the name of this tree.
    pub fn name(&self) -> &str {
        &self.root.name
    }

    /// Returns the total number of test cases in this tree.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Returns the number of cases that failed or errored.
    pub fn fail_count(&self) -> usize {
        self.cases()
            .filter(|case| matches!(case.status, CaseStatus::Failed | CaseStatus::Errored))
            .count()
    }

    /// Iterates over all cases in the tree, in tree order.
    pub fn cases(&self) -> impl Iterator<Item = &CaseResult> + '_ {
        self.root.classes().flat_map(|class| class.cases.iter())
    }

    /// Returns the portion of this tree that was produced within the given pipeline block.
    ///
    /// A case belongs to a block if the block's id is among the case's enclosing blocks.
    pub fn for_pipeline_block(&self, block_id: &str) -> ResultTree {
        let cases = self
            .cases()
            .filter(|case| case.enclosing_blocks.iter().any(|id| id == block_id))
            .cloned();
        ResultTree::from_cases(self.root.name.clone(), cases)
    }

    fn into_cases(self) -> impl Iterator<Item = CaseResult> {
        let mut cases = Vec::with_capacity(self.total_count);
        let mut stack = vec![ResultNode::Tabulated(self.root)];
        while let Some(node) = stack.pop() {
            match node {
                ResultNode::Tabulated(tabulated) => {
                    stack.extend(tabulated.children.into_iter().rev());
                }
                ResultNode::Class(class) => cases.extend(class.cases),
            }
        }
        cases.into_iter()
    }
}

/// A node within a [`ResultTree`].
#[derive(Clone, Debug)]
pub enum ResultNode {
    /// A container of other nodes, such as a package.
    Tabulated(TabulatedResult),

    /// A class, containing test cases.
    Class(ClassResult),
}

/// A container node: the root of the tree, or a package.
#[derive(Clone, Debug)]
pub struct TabulatedResult {
    /// The name of this node.
    pub name: String,

    /// The children of this node.
    pub children: Vec<ResultNode>,
}

impl TabulatedResult {
    /// Creates a new, empty tabulated node.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: vec![],
        }
    }

    fn classes(&self) -> impl Iterator<Item = &ClassResult> + '_ {
        let mut stack: Vec<&ResultNode> = self.children.iter().rev().collect();
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                match node {
                    ResultNode::Tabulated(tabulated) => stack.extend(tabulated.children.iter().rev()),
                    ResultNode::Class(class) => return Some(class),
                }
            }
            None
        })
    }
}

/// The results for a single test class.
#[derive(Clone, Debug)]
pub struct ClassResult {
    package: String,
    name: String,
    cases: Vec<CaseResult>,
}

impl ClassResult {
    fn new(package: &str, name: &str) -> Self {
        Self {
            package: package.to_owned(),
            name: name.to_owned(),
            cases: vec![],
        }
    }

    /// Returns the name of the package this class is in.
    ///
    /// This is [`ROOT_PACKAGE`] for classes that aren't in a package.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Returns the simple name of this class, without the package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fully qualified name of this class.
    pub fn full_name(&self) -> String {
        if self.package == ROOT_PACKAGE {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Returns the cases in this class.
    pub fn cases(&self) -> &[CaseResult] {
        &self.cases
    }

    /// Returns the total time taken by the cases in this class.
    pub fn duration(&self) -> Duration {
        self.cases.iter().map(|case| case.duration).sum()
    }
}

/// The result of a single test case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaseResult {
    /// The name of the case.
    pub name: String,

    /// The fully qualified name of the class this case belongs to.
    pub class_name: String,

    /// The time it took to execute this case.
    pub duration: Duration,

    /// The status of this case.
    pub status: CaseStatus,

    /// Identifiers of the pipeline blocks this case ran within, innermost first.
    pub enclosing_blocks: Vec<String>,
}

impl CaseResult {
    /// Creates a new passing case with no recorded duration.
    pub fn new(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            duration: Duration::ZERO,
            status: CaseStatus::Passed,
            enclosing_blocks: vec![],
        }
    }

    /// Sets the time taken by this case.
    pub fn set_duration(&mut self, duration: Duration) -> &mut Self {
        self.duration = duration;
        self
    }

    /// Sets the status of this case.
    pub fn set_status(&mut self, status: CaseStatus) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets the pipeline blocks this case ran within, innermost first.
    pub fn set_enclosing_blocks(
        &mut self,
        blocks: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.enclosing_blocks = blocks.into_iter().map(Into::into).collect();
        self
    }
}

/// The outcome of a test case.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaseStatus {
    /// The case passed.
    Passed,

    /// The case failed in an expected way.
    Failed,

    /// The case failed unexpectedly.
    Errored,

    /// The case was not run.
    Skipped,
}

/// Splits `a.b.C` into `("a.b", "C")`, and `C` into `(ROOT_PACKAGE, "C")`.
fn split_class_name(class_name: &str) -> (&str, &str) {
    match class_name.rsplit_once('.') {
        Some((package, name)) if !package.is_empty() => (package, name),
        Some((_, name)) => (ROOT_PACKAGE, name),
        None => (ROOT_PACKAGE, class_name),
    }
}
