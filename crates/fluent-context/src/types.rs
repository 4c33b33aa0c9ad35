//! The context tree and the small set of helpers every component shares:
//! dotted-path access, stable JSON stringification, and the task-type enum
//! that tunes importance scoring.

use serde_json::{Map, Value};

/// The context tree is a plain JSON object. `serde_json::Map` is
/// `BTreeMap`-backed by default (the `preserve_order` feature is not
/// enabled in this workspace), so two trees with the same content always
/// serialize identically — structural-equality tests (idempotent no-op,
/// lossless round-trip) can compare the serialized form directly.
pub type ContextTree = Map<String, Value>;

pub fn empty_tree() -> ContextTree {
    Map::new()
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Read a value by dotted path. Traversal through a non-object intermediate
/// node yields `None` and never mutates.
pub fn get_path<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = split_path(path);
    let mut cur = tree;
    for seg in segments {
        cur = cur.as_object()?.get(seg)?;
    }
    Some(cur)
}

pub fn get_path_in_map<'a>(tree: &'a ContextTree, path: &str) -> Option<&'a Value> {
    let segments = split_path(path);
    if segments.is_empty() {
        return None;
    }
    let mut cur = tree.get(segments[0])?;
    for seg in &segments[1..] {
        cur = cur.as_object()?.get(*seg)?;
    }
    Some(cur)
}

/// Write a value by dotted path, creating missing intermediate objects.
pub fn set_path(tree: &mut ContextTree, path: &str, value: Value) {
    let segments = split_path(path);
    if segments.is_empty() {
        return;
    }
    if segments.len() == 1 {
        tree.insert(segments[0].to_string(), value);
        return;
    }

    let mut cur = tree
        .entry(segments[0].to_string())
        .or_insert_with(|| Value::Object(Map::new()));

    for seg in &segments[1..segments.len() - 1] {
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        cur = cur
            .as_object_mut()
            .unwrap()
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !cur.is_object() {
        *cur = Value::Object(Map::new());
    }
    cur.as_object_mut()
        .unwrap()
        .insert(segments[segments.len() - 1].to_string(), value);
}

/// Stable stringification used for aggregate pruning candidates and for
/// hashing configs. `serde_json::to_string` over a `BTreeMap`-backed map is
/// already stable; this wrapper exists so call sites read intentionally.
pub fn json_stringify(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Task type drives multiplicative adjustments in the Importance Scorer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskType {
    Debugging,
    Implementation,
    Refactoring,
    Documentation,
    Other(String),
}

impl TaskType {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "debugging" => TaskType::Debugging,
            "implementation" => TaskType::Implementation,
            "refactoring" => TaskType::Refactoring,
            "documentation" => TaskType::Documentation,
            other => TaskType::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_round_trip() {
        let mut tree = empty_tree();
        set_path(&mut tree, "a.b.c", Value::from(42));
        let root = Value::Object(tree.clone());
        assert_eq!(get_path(&root, "a.b.c"), Some(&Value::from(42)));
        assert_eq!(get_path(&root, "a.b.missing"), None);
    }

    #[test]
    fn traversal_through_non_object_yields_none() {
        let mut tree = empty_tree();
        set_path(&mut tree, "a", Value::from("scalar"));
        let root = Value::Object(tree);
        assert_eq!(get_path(&root, "a.b"), None);
    }

    #[test]
    fn task_type_parses_known_variants() {
        assert_eq!(TaskType::parse("Debugging"), TaskType::Debugging);
        assert_eq!(
            TaskType::parse("something_else"),
            TaskType::Other("something_else".to_string())
        );
    }
}
