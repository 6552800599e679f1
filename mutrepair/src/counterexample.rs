// SPDX-License-Identifier: Apache-2.0

//! Counterexamples reported by the verifier and the per-run cache that
//! replays them against later candidates.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The solver output a counterexample was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolvedModel {
    pub command: String,
    pub solution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    /// `None` when the model left the parameter unconstrained; the invoker
    /// substitutes a default for the parameter's type.
    #[serde(default)]
    pub value: Option<Value>,
}

/// An input assignment that makes a candidate violate its specification.
///
/// Equality is structural over the solved model only: two examples read
/// from the same command and solution are the same example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterExample {
    pub class_name: String,
    pub routine: String,
    #[serde(default)]
    pub receiver: Option<Value>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    /// Static fields to assign before the call, keyed by class then field.
    #[serde(default)]
    pub statics: BTreeMap<String, BTreeMap<String, Value>>,
    pub model: SolvedModel,
}

impl PartialEq for CounterExample {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
    }
}

impl Eq for CounterExample {}

/// Append-only, insertion-ordered set of counterexamples for one run.
#[derive(Debug, Default)]
pub struct CounterExampleCache {
    examples: Vec<CounterExample>,
    seen: HashSet<SolvedModel>,
}

impl CounterExampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `example` unless an equal one is present; returns whether it was
    /// added.
    pub fn insert(&mut self, example: CounterExample) -> bool {
        if !self.seen.insert(example.model.clone()) {
            log::debug!(
                "CounterExampleCache::insert; duplicate model for {}::{}",
                example.class_name,
                example.routine
            );
            return false;
        }
        self.examples.push(example);
        log::info!("CounterExampleCache::insert; size: {}", self.examples.len());
        true
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CounterExample> {
        self.examples.iter()
    }

    pub fn get(&self, index: usize) -> Option<&CounterExample> {
        self.examples.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn example(x: i64, solution: &str) -> CounterExample {
        CounterExample {
            class_name: "demo.Calc".to_string(),
            routine: "addTwo".to_string(),
            receiver: None,
            arguments: vec![Argument {
                name: "x".to_string(),
                value: Some(json!(x)),
            }],
            statics: btreemap! {},
            model: SolvedModel {
                command: "check addTwo".to_string(),
                solution: solution.to_string(),
            },
        }
    }

    #[test]
    fn test_equality_is_over_model() {
        // Same model, different recovered inputs: still equal.
        assert_eq!(example(1, "x=1"), example(7, "x=1"));
        assert_ne!(example(1, "x=1"), example(1, "x=2"));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut cache = CounterExampleCache::new();
        assert!(cache.insert(example(1, "x=1")));
        assert!(!cache.insert(example(1, "x=1")));
        assert_eq!(cache.len(), 1);
        assert!(cache.insert(example(2, "x=2")));
        assert_eq!(cache.len(), 2);
        let order: Vec<&str> = cache.iter().map(|e| e.model.solution.as_str()).collect();
        assert_eq!(order, vec!["x=1", "x=2"]);
    }

    #[test]
    fn test_deserialize_with_statics_and_missing_value() {
        let text = r#"{
            "class_name": "demo.Counter",
            "routine": "bump",
            "receiver": {"count": 3},
            "arguments": [{"name": "by"}],
            "statics": {"demo.Counter": {"limit": 10}},
            "model": {"command": "run bump", "solution": "count=3"}
        }"#;
        let ce: CounterExample = serde_json::from_str(text).unwrap();
        assert_eq!(ce.arguments[0].value, None);
        assert_eq!(ce.statics["demo.Counter"]["limit"], json!(10));
        assert_eq!(ce.receiver, Some(json!({"count": 3})));
    }
}
