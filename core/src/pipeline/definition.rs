// agentflow/src/pipeline/definition.rs

//! Contains the declarative pipeline configuration (`PipelinesConfig`) and the
//! `PipelineSource` lookup the orchestrator resolves source names through.

use crate::core::agent::AgentOptions;
use crate::core::step::{Step, StepDescriptor};
use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Resolves a source name into its ordered step list.
///
/// `None` means "no pipeline for this source"; the orchestrator turns that into
/// `FlowError::PipelineNotFound`.
pub trait PipelineSource: Send + Sync {
  fn pipeline(&self, source_name: &str) -> Option<Vec<StepDescriptor>>;

  /// Options every agent is built with before step-level `config` is applied.
  fn agent_options(&self, _agent: &str) -> AgentOptions {
    AgentOptions::new()
  }
}

/// Default options for agents, as found under `[defaults]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDefaults {
  /// Applied to every agent.
  #[serde(default)]
  pub common: AgentOptions,
  /// Applied to the named agent, over `common`.
  #[serde(default)]
  pub agents: HashMap<String, AgentOptions>,
}

impl AgentDefaults {
  pub fn options_for(&self, agent: &str) -> AgentOptions {
    let mut options = self.common.clone();
    if let Some(specific) = self.agents.get(agent) {
      for (key, value) in specific {
        options.insert(key.clone(), value.clone());
      }
    }
    options
  }

  pub fn is_empty(&self) -> bool {
    self.common.is_empty() && self.agents.is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// A source without a `pipeline` list is treated as not configured.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pipeline: Option<Vec<StepDescriptor>>,
}

/// The whole pipelines document: defaults plus one pipeline per source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelinesConfig {
  #[serde(default)]
  pub defaults: AgentDefaults,
  #[serde(default)]
  pub sources: BTreeMap<String, SourceConfig>,
}

impl PipelinesConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds (or replaces) the pipeline for `source_name`.
  pub fn with_source(mut self, source_name: impl Into<String>, pipeline: Vec<StepDescriptor>) -> Self {
    self.sources.insert(
      source_name.into(),
      SourceConfig {
        description: None,
        pipeline: Some(pipeline),
      },
    );
    self
  }

  pub fn with_defaults(mut self, defaults: AgentDefaults) -> Self {
    self.defaults = defaults;
    self
  }

  /// Configured source names, sorted.
  pub fn sources(&self) -> Vec<&str> {
    self.sources.keys().map(String::as_str).collect()
  }

  /// Converts every descriptor of every source, reporting the first one that
  /// would fail with `InvalidStep` at run time.
  pub fn validate(&self) -> FlowResult<()> {
    for (source_name, source) in &self.sources {
      for (idx, descriptor) in source.pipeline.iter().flatten().enumerate() {
        Step::try_from(descriptor).map_err(|err| match err {
          FlowError::InvalidStep { message } => FlowError::InvalidStep {
            message: format!("source '{}', step {}: {}", source_name, idx, message),
          },
          other => other,
        })?;
      }
    }
    Ok(())
  }
}

impl PipelineSource for PipelinesConfig {
  fn pipeline(&self, source_name: &str) -> Option<Vec<StepDescriptor>> {
    self.sources.get(source_name).and_then(|source| source.pipeline.clone())
  }

  fn agent_options(&self, agent: &str) -> AgentOptions {
    self.defaults.options_for(agent)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use serde_json::json;

  #[test]
  fn defaults_layer_specific_over_common() {
    let mut defaults = AgentDefaults::default();
    defaults.common.insert("timeout".into(), json!(30));
    defaults.common.insert("retries".into(), json!(0));
    defaults
      .agents
      .insert("http_fetch".into(), json!({"timeout": 5}).as_object().cloned().unwrap());

    let fetch = defaults.options_for("http_fetch");
    assert_eq!(fetch.get("timeout"), Some(&json!(5)));
    assert_eq!(fetch.get("retries"), Some(&json!(0)));

    let other = defaults.options_for("html_parse");
    assert_eq!(other.get("timeout"), Some(&json!(30)));
  }

  #[test]
  fn lookup_returns_none_for_unknown_source() {
    let config = PipelinesConfig::new().with_source("alfabeta", vec![StepDescriptor::agent("fetch")]);
    assert_eq!(config.pipeline("alfabeta").map(|p| p.len()), Some(1));
    assert!(config.pipeline("missing").is_none());
    assert_eq!(config.sources(), vec!["alfabeta"]);
  }

  #[test]
  fn validate_points_at_the_bad_step() {
    let config = PipelinesConfig::new().with_source(
      "alfabeta",
      vec![StepDescriptor::agent("fetch"), StepDescriptor::ensemble("vote", vec![StepDescriptor::agent("a")])],
    );
    let err = config.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStep);
    let msg = err.to_string();
    assert!(msg.contains("alfabeta"));
    assert!(msg.contains("step 1"));
  }
}
