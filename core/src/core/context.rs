// agentflow/src/core/context.rs

//! Defines `AgentContext`, the unit of state threaded through a pipeline run.
//!
//! A context owns two JSON maps:
//!  - `data`: what the agents produce and consume.
//!  - `metadata`: run-level bookkeeping (`run_id`, `execution_date`, ...) and the
//!    per-branch outcomes recorded by parallel blocks.
//!
//! Contexts have value semantics. Every parallel sibling and every ensemble
//! candidate receives its own copy, and only the orchestrator merges copies
//! back together once the owning block has joined.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key-value map used for both `data` and `metadata`.
pub type ValueMap = Map<String, Value>;

/// Metadata key under which parallel blocks record each sibling's outcome.
pub const PARALLEL_RESULTS_KEY: &str = "parallel_results";
/// Metadata key carrying the run identifier.
pub const RUN_ID_KEY: &str = "run_id";
/// Metadata key carrying the scheduler's execution date.
pub const EXECUTION_DATE_KEY: &str = "execution_date";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
  #[serde(default)]
  pub data: ValueMap,
  #[serde(default)]
  pub metadata: ValueMap,
}

impl AgentContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_metadata(metadata: ValueMap) -> Self {
    Self {
      data: ValueMap::new(),
      metadata,
    }
  }

  pub fn from_parts(data: ValueMap, metadata: ValueMap) -> Self {
    Self { data, metadata }
  }

  /// Initial context for a scheduled run, carrying `run_id` and `execution_date`.
  pub fn for_run(run_id: impl Into<String>, execution_date: impl Into<String>) -> Self {
    let mut ctx = Self::new();
    ctx.set_metadata(RUN_ID_KEY, Value::String(run_id.into()));
    ctx.set_metadata(EXECUTION_DATE_KEY, Value::String(execution_date.into()));
    ctx
  }

  // --- data ---

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.data.get(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.data.contains_key(key)
  }

  /// Inserts into `data`, returning the previous value if any.
  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
    self.data.insert(key.into(), value.into())
  }

  pub fn remove(&mut self, key: &str) -> Option<Value> {
    self.data.remove(key)
  }

  // --- metadata ---

  pub fn get_metadata(&self, key: &str) -> Option<&Value> {
    self.metadata.get(key)
  }

  pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
    self.metadata.insert(key.into(), value.into())
  }

  /// The run id recorded in metadata, when it is a string.
  pub fn run_id(&self) -> Option<&str> {
    self.metadata.get(RUN_ID_KEY).and_then(Value::as_str)
  }

  // --- copy / merge ---

  /// Independent copy: mutating the result never touches `self`.
  ///
  /// Equivalent to `clone()`; spelled out because the orchestrator relies on it
  /// for branch isolation.
  pub fn copy(&self) -> Self {
    self.clone()
  }

  /// Merges `other` into `self`. Keys present in both take `other`'s value, for
  /// `data` and for `metadata` alike.
  pub fn merge(&mut self, other: &AgentContext) {
    for (key, value) in &other.data {
      self.data.insert(key.clone(), value.clone());
    }
    for (key, value) in &other.metadata {
      self.metadata.insert(key.clone(), value.clone());
    }
  }

  /// Same as [`merge`](Self::merge) but consumes `other` and avoids cloning values.
  pub fn merge_owned(&mut self, other: AgentContext) {
    self.data.extend(other.data);
    self.metadata.extend(other.metadata);
  }

  // --- nested lookup ---

  /// Reads a dotted path (`"quality.score"`) out of `data`.
  pub fn get_nested(&self, path: &str) -> Option<&Value> {
    lookup_path(&self.data, path)
  }

  /// Like [`get_nested`](Self::get_nested) but returns `default` when any segment is
  /// absent or not an object.
  pub fn get_nested_or(&self, path: &str, default: Value) -> Value {
    self.get_nested(path).cloned().unwrap_or(default)
  }

  /// Reads a dotted path out of `metadata`.
  pub fn get_metadata_nested(&self, path: &str) -> Option<&Value> {
    lookup_path(&self.metadata, path)
  }

  /// Snapshot used for per-branch observability: `{"data": {...}, "metadata": {...}}`.
  pub fn snapshot(&self) -> Value {
    self.snapshot_without(&[])
  }

  /// Like [`snapshot`](Self::snapshot), leaving the given metadata keys out.
  pub fn snapshot_without(&self, metadata_keys: &[&str]) -> Value {
    let metadata: ValueMap = self
      .metadata
      .iter()
      .filter(|(key, _)| !metadata_keys.contains(&key.as_str()))
      .map(|(key, value)| (key.clone(), value.clone()))
      .collect();
    let mut snapshot = ValueMap::new();
    snapshot.insert("data".to_string(), Value::Object(self.data.clone()));
    snapshot.insert("metadata".to_string(), Value::Object(metadata));
    Value::Object(snapshot)
  }
}

fn lookup_path<'a>(root: &'a ValueMap, path: &str) -> Option<&'a Value> {
  let mut segments = path.split('.');
  let first = segments.next()?;
  let mut current = root.get(first)?;
  for segment in segments {
    current = current.as_object()?.get(segment)?;
  }
  Some(current)
}
