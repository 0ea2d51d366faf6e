// agentflow/src/core/step.rs

//! Defines pipeline steps in two forms:
//!  - `StepDescriptor`: the declarative shape read from configuration
//!    (`{agent = ...}`, `{parallel = [...]}`, `{ensemble = {...}}`). Any entry
//!    deserializes; the shape and value types are only checked on conversion,
//!    so a malformed entry surfaces as `FlowError::InvalidStep` when the step is
//!    reached and never keeps the other sources of the same file from loading.
//!  - `Step`: the closed variant the orchestrator executes.

use crate::core::agent::AgentOptions;
use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const AGENT_KEY: &str = "agent";
const CONFIG_KEY: &str = "config";
const PARALLEL_KEY: &str = "parallel";
const ENSEMBLE_KEY: &str = "ensemble";

/// One entry of a pipeline definition, as written in configuration.
///
/// An entry carrying more than one of `agent` / `parallel` / `ensemble` is
/// rejected as `InvalidStep` rather than resolved by precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct StepDescriptor {
  pub agent: Option<Value>,

  /// Per-step agent options, layered over the configured defaults.
  pub config: Option<Value>,

  pub parallel: Option<Value>,

  /// `{ strategy = "...", agents = [...] }`
  pub ensemble: Option<Value>,

  /// Anything else; only used to describe a rejected descriptor.
  pub unrecognized: BTreeMap<String, Value>,
}

impl From<Value> for StepDescriptor {
  fn from(value: Value) -> Self {
    let mut descriptor = StepDescriptor::default();
    match value {
      Value::Object(mut map) => {
        descriptor.agent = map.remove(AGENT_KEY);
        descriptor.config = map.remove(CONFIG_KEY);
        descriptor.parallel = map.remove(PARALLEL_KEY);
        descriptor.ensemble = map.remove(ENSEMBLE_KEY);
        descriptor.unrecognized = map.into_iter().collect();
      }
      other => {
        descriptor.unrecognized.insert("value".to_string(), other);
      }
    }
    descriptor
  }
}

impl From<StepDescriptor> for Value {
  fn from(descriptor: StepDescriptor) -> Self {
    let mut map: serde_json::Map<String, Value> = descriptor.unrecognized.into_iter().collect();
    let known = [
      (AGENT_KEY, descriptor.agent),
      (CONFIG_KEY, descriptor.config),
      (PARALLEL_KEY, descriptor.parallel),
      (ENSEMBLE_KEY, descriptor.ensemble),
    ];
    for (key, value) in known {
      if let Some(value) = value {
        map.insert(key.to_string(), value);
      }
    }
    Value::Object(map)
  }
}

impl StepDescriptor {
  pub fn agent(name: impl Into<String>) -> Self {
    Self {
      agent: Some(Value::String(name.into())),
      ..Default::default()
    }
  }

  pub fn agent_with_config(name: impl Into<String>, config: AgentOptions) -> Self {
    Self {
      agent: Some(Value::String(name.into())),
      config: Some(Value::Object(config)),
      ..Default::default()
    }
  }

  pub fn parallel(children: Vec<StepDescriptor>) -> Self {
    Self {
      parallel: Some(Value::Array(children.into_iter().map(Value::from).collect())),
      ..Default::default()
    }
  }

  pub fn ensemble(strategy: impl Into<String>, candidates: Vec<StepDescriptor>) -> Self {
    let mut block = serde_json::Map::new();
    block.insert("strategy".to_string(), Value::String(strategy.into()));
    block.insert(
      "agents".to_string(),
      Value::Array(candidates.into_iter().map(Value::from).collect()),
    );
    Self {
      ensemble: Some(Value::Object(block)),
      ..Default::default()
    }
  }

  fn describe(&self) -> String {
    Value::from(self.clone()).to_string()
  }
}

/// How an ensemble block picks its winning candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnsembleStrategy {
  /// Take the first candidate's result; later candidates never run.
  #[default]
  FirstSuccess,
  /// Run every candidate and keep the one with the strictly highest score.
  BestScore,
}

impl EnsembleStrategy {
  pub fn as_str(&self) -> &'static str {
    match self {
      EnsembleStrategy::FirstSuccess => "first_success",
      EnsembleStrategy::BestScore => "best_score",
    }
  }
}

impl fmt::Display for EnsembleStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EnsembleStrategy {
  type Err = FlowError;

  fn from_str(s: &str) -> FlowResult<Self> {
    match s {
      "first_success" => Ok(EnsembleStrategy::FirstSuccess),
      "best_score" => Ok(EnsembleStrategy::BestScore),
      other => Err(FlowError::invalid_step(format!("unknown ensemble strategy '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentStep {
  pub name: String,
  pub config: AgentOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleStep {
  pub strategy: EnsembleStrategy,
  pub candidates: Vec<Step>,
}

/// An executable step. Blocks nest freely.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
  Agent(AgentStep),
  Parallel(Vec<Step>),
  Ensemble(EnsembleStep),
}

impl Step {
  pub fn kind(&self) -> &'static str {
    match self {
      Step::Agent(_) => "agent",
      Step::Parallel(_) => "parallel",
      Step::Ensemble(_) => "ensemble",
    }
  }
}

impl TryFrom<&StepDescriptor> for Step {
  type Error = FlowError;

  fn try_from(descriptor: &StepDescriptor) -> FlowResult<Self> {
    let shapes = [
      descriptor.agent.is_some(),
      descriptor.parallel.is_some(),
      descriptor.ensemble.is_some(),
    ];
    match shapes.iter().filter(|present| **present).count() {
      0 => {
        return Err(FlowError::invalid_step(format!(
          "step matches none of agent/parallel/ensemble: {}",
          descriptor.describe()
        )))
      }
      1 => {}
      _ => {
        return Err(FlowError::invalid_step(format!(
          "step mixes more than one of agent/parallel/ensemble: {}",
          descriptor.describe()
        )))
      }
    }

    if let Some(agent) = &descriptor.agent {
      let name = match agent {
        Value::String(name) if !name.trim().is_empty() => name.clone(),
        Value::String(_) => return Err(FlowError::invalid_step("agent step has an empty name")),
        other => {
          return Err(FlowError::invalid_step(format!(
            "agent name must be a string, got {}",
            other
          )))
        }
      };
      let config = match &descriptor.config {
        None => AgentOptions::new(),
        Some(Value::Object(options)) => options.clone(),
        Some(other) => {
          return Err(FlowError::invalid_step(format!(
            "config of agent '{}' must be a table, got {}",
            name, other
          )))
        }
      };
      return Ok(Step::Agent(AgentStep { name, config }));
    }

    if let Some(children) = &descriptor.parallel {
      return Ok(Step::Parallel(convert_children(PARALLEL_KEY, children)?));
    }

    match &descriptor.ensemble {
      Some(Value::Object(block)) => {
        let strategy = match block.get("strategy") {
          None | Some(Value::Null) => EnsembleStrategy::default(),
          Some(Value::String(name)) => name.parse::<EnsembleStrategy>()?,
          Some(other) => {
            return Err(FlowError::invalid_step(format!(
              "ensemble strategy must be a string, got {}",
              other
            )))
          }
        };
        let candidates = match block.get("agents") {
          Some(agents) => convert_children("ensemble agents", agents)?,
          None => Vec::new(),
        };
        if candidates.is_empty() {
          return Err(FlowError::invalid_step("ensemble block requires at least one candidate in 'agents'"));
        }
        Ok(Step::Ensemble(EnsembleStep { strategy, candidates }))
      }
      Some(other) => Err(FlowError::invalid_step(format!(
        "ensemble must be a table with 'strategy' and 'agents', got {}",
        other
      ))),
      None => Err(FlowError::invalid_step(format!(
        "step matches none of agent/parallel/ensemble: {}",
        descriptor.describe()
      ))),
    }
  }
}

fn convert_children(what: &str, children: &Value) -> FlowResult<Vec<Step>> {
  match children {
    Value::Array(items) => items
      .iter()
      .map(|item| Step::try_from(&StepDescriptor::from(item.clone())))
      .collect(),
    other => Err(FlowError::invalid_step(format!("{} must be a list of steps, got {}", what, other))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use serde_json::json;

  fn parse(value: Value) -> FlowResult<Step> {
    let descriptor: StepDescriptor = serde_json::from_value(value).unwrap();
    Step::try_from(&descriptor)
  }

  #[test]
  fn agent_descriptor_becomes_agent_step() {
    let step = parse(json!({"agent": "http_fetch", "config": {"timeout": 5}})).unwrap();
    match step {
      Step::Agent(agent) => {
        assert_eq!(agent.name, "http_fetch");
        assert_eq!(agent.config.get("timeout"), Some(&json!(5)));
      }
      other => panic!("expected agent step, got {:?}", other),
    }
  }

  #[test]
  fn nested_blocks_are_accepted() {
    let step = parse(json!({
      "parallel": [
        {"agent": "a"},
        {"ensemble": {"strategy": "best_score", "agents": [{"agent": "b"}, {"parallel": [{"agent": "c"}]}]}}
      ]
    }))
    .unwrap();
    let Step::Parallel(children) = step else {
      panic!("expected parallel block");
    };
    assert_eq!(children.len(), 2);
    assert_eq!(children[1].kind(), "ensemble");
  }

  #[test]
  fn ensemble_strategy_defaults_to_first_success() {
    let step = parse(json!({"ensemble": {"agents": [{"agent": "a"}]}})).unwrap();
    let Step::Ensemble(block) = step else {
      panic!("expected ensemble block");
    };
    assert_eq!(block.strategy, EnsembleStrategy::FirstSuccess);
  }

  #[test]
  fn unknown_shape_is_invalid_step() {
    let err = parse(json!({"loop": [{"agent": "a"}]})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStep);
    assert!(err.to_string().contains("loop"));
  }

  #[test]
  fn mixed_shape_is_invalid_step() {
    let err = parse(json!({"agent": "a", "parallel": []})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStep);
  }

  #[test]
  fn unknown_strategy_and_empty_ensemble_are_invalid() {
    let err = parse(json!({"ensemble": {"strategy": "majority", "agents": [{"agent": "a"}]}})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStep);
    assert!(err.to_string().contains("majority"));

    let err = parse(json!({"ensemble": {"strategy": "best_score", "agents": []}})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStep);
  }

  #[test]
  fn wrong_value_types_are_invalid_step() {
    for value in [
      json!({"parallel": "oops"}),
      json!({"agent": 5}),
      json!({"ensemble": [{"agent": "a"}]}),
      json!({"agent": "a", "config": "fast"}),
      json!({"ensemble": {"strategy": 3, "agents": [{"agent": "a"}]}}),
    ] {
      let err = parse(value.clone()).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::InvalidStep, "{}", value);
    }
  }

  #[test]
  fn non_table_entry_is_invalid_step() {
    let err = parse(json!("http_fetch")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStep);
  }

  #[test]
  fn constructors_serialize_to_config_shape() {
    let descriptor = StepDescriptor::ensemble("best_score", vec![StepDescriptor::agent("a")]);
    assert_eq!(
      serde_json::to_value(&descriptor).unwrap(),
      json!({"ensemble": {"strategy": "best_score", "agents": [{"agent": "a"}]}})
    );
  }

  #[test]
  fn invalid_child_inside_parallel_is_reported() {
    let err = parse(json!({"parallel": [{"agent": "a"}, {"oops": 1}]})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStep);
  }
}
