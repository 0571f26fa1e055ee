// Copyright (c) The lanesplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted units of work that are split across lanes.

use std::collections::{BTreeMap, btree_map};

/// The nominal duration, in milliseconds, given to tests discovered from source files.
pub const ESTIMATED_DURATION_MS: u64 = 10;

/// What a [`TestEntity`] stands for, which decides the patterns it expands to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityKind {
    /// A test class, identified by its fully qualified name.
    Class,

    /// An individual test case.
    Case,
}

/// A unit of work with an observed or estimated duration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestEntity {
    key: String,
    duration_ms: u64,
    kind: EntityKind,
}

impl TestEntity {
    /// Creates a new class entity.
    ///
    /// `key` is a fully qualified class name (`org.example.FooTest`), or a path without extension
    /// (`org/example/FooTest`).
    pub fn class(key: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            key: key.into(),
            duration_ms,
            kind: EntityKind::Class,
        }
    }

    /// Creates a new case entity.
    pub fn case(key: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            key: key.into(),
            duration_ms,
            kind: EntityKind::Case,
        }
    }

    /// Returns the unique key for this entity.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the duration of this entity in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Returns the kind of this entity.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the patterns that select this entity in a downstream test runner.
    ///
    /// A class expands to its source and compiled file names, e.g. `org/example/FooTest.java` and
    /// `org/example/FooTest.class`. A case expands to its key.
    pub fn elements(&self) -> Vec<String> {
        match self.kind {
            EntityKind::Class => {
                let path = self.key.replace('.', "/");
                vec![format!("{path}.java"), format!("{path}.class")]
            }
            EntityKind::Case => vec![self.key.clone()],
        }
    }
}

/// A set of [`TestEntity`] instances, ordered by key.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestEntityMap {
    entities: BTreeMap<String, TestEntity>,
}

impl TestEntityMap {
    /// Creates a new, empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity, replacing any existing entity with the same key.
    pub fn insert_replacing(&mut self, entity: TestEntity) {
        self.entities.insert(entity.key.clone(), entity);
    }

    /// Inserts an entity. If an entity with the same key exists, the durations are summed.
    pub fn insert_merging(&mut self, entity: TestEntity) {
        match self.entities.entry(entity.key.clone()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(entity);
            }
            btree_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.duration_ms = existing.duration_ms.saturating_add(entity.duration_ms);
            }
        }
    }

    /// Returns the entity with the given key.
    pub fn get(&self, key: &str) -> Option<&TestEntity> {
        self.entities.get(key)
    }

    /// Returns the number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if there are no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the sum of all entity durations, in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.entities
            .values()
            .map(|entity| entity.duration_ms)
            .fold(0, u64::saturating_add)
    }

    /// Iterates over the entities in key order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestEntity> + '_ {
        self.entities.values()
    }
}

impl IntoIterator for TestEntityMap {
    type Item = TestEntity;
    type IntoIter = btree_map::IntoValues<String, TestEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_values()
    }
}

impl FromIterator<TestEntity> for TestEntityMap {
    /// Collects entities, keeping the last entity seen for each key.
    fn from_iter<T: IntoIterator<Item = TestEntity>>(iter: T) -> Self {
        let mut map = Self::new();
        for entity in iter {
            map.insert_replacing(entity);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(
        TestEntity::class("org.example.FooTest", 1),
        &["org/example/FooTest.java", "org/example/FooTest.class"];
        "qualified class"
    )]
    #[test_case(
        TestEntity::class("pkg/sub/FooTest", 1),
        &["pkg/sub/FooTest.java", "pkg/sub/FooTest.class"];
        "estimated class"
    )]
    #[test_case(TestEntity::class("FooTest", 1), &["FooTest.java", "FooTest.class"]; "root class")]
    #[test_case(
        TestEntity::case("org.example.FooTest#testBar", 1),
        &["org.example.FooTest#testBar"];
        "case"
    )]
    fn elements(entity: TestEntity, expected: &[&str]) {
        assert_eq!(entity.elements(), expected);
    }

    #[test]
    fn merging_sums_durations() {
        let mut map = TestEntityMap::new();
        map.insert_merging(TestEntity::case("a#b", 5));
        map.insert_merging(TestEntity::case("a#b", 7));
        map.insert_merging(TestEntity::case("a#c", 1));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a#b").map(TestEntity::duration_ms), Some(12));
        assert_eq!(map.total_duration_ms(), 13);
    }

    #[test]
    fn replacing_keeps_last() {
        let map: TestEntityMap = [TestEntity::class("a.B", 5), TestEntity::class("a.B", 7)]
            .into_iter()
            .collect();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a.B").map(TestEntity::duration_ms), Some(7));
    }

    #[test]
    fn iterates_in_key_order() {
        let map: TestEntityMap = ["c", "a", "b"]
            .into_iter()
            .map(|key| TestEntity::case(key, 0))
            .collect();
        let keys: Vec<_> = map.iter().map(TestEntity::key).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }
}
