// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Deserialize;
use std::collections::HashSet;

/// The graph of pipeline steps executed by a build.
///
/// Each node lists the nodes that ran directly before it. The heads of the graph are the nodes
/// nothing else ran after.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct FlowGraph {
    #[serde(default)]
    nodes: Vec<FlowNode>,
}

impl FlowGraph {
    /// Creates a new graph from its nodes.
    pub fn new(nodes: impl IntoIterator<Item = FlowNode>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Returns all nodes, in the order they were recorded.
    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    /// Returns the node with the given id.
    pub fn get(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Returns the heads of the graph, in recorded order.
    pub fn heads(&self) -> impl Iterator<Item = &FlowNode> + '_ {
        let parents: HashSet<&str> = self
            .nodes
            .iter()
            .flat_map(|node| node.parents.iter().map(String::as_str))
            .collect();
        self.nodes
            .iter()
            .filter(move |node| !parents.contains(node.id.as_str()))
    }

    /// Searches backwards from the heads for the first node labeled `label`.
    ///
    /// The search is depth-first, visits each node at most once, and ignores parent ids that don't
    /// correspond to a node.
    pub fn find_labeled(&self, label: &str) -> Option<&FlowNode> {
        let mut visited = HashSet::new();
        let mut stack: Vec<&FlowNode> = self.heads().collect();
        stack.reverse();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id.as_str()) {
                continue;
            }
            if node.label.as_deref() == Some(label) {
                return Some(node);
            }
            stack.extend(node.parents.iter().rev().filter_map(|id| self.get(id)));
        }
        None
    }
}

/// A single step in a [`FlowGraph`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct FlowNode {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
}

impl FlowNode {
    /// Creates a new node.
    pub fn new(
        id: impl Into<String>,
        label: Option<impl Into<String>>,
        parents: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.map(Into::into),
            parents: parents.into_iter().map(Into::into).collect(),
        }
    }

    /// The identifier of this node. Test cases record the ids of the blocks they ran within.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The label of this node, if it has one.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The ids of the nodes that ran directly before this one.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }
}
