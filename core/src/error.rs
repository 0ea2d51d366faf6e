// agentflow/src/error.rs
use anyhow::Error as AnyhowError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("No pipeline configured for source '{source_name}'")]
  PipelineNotFound { source_name: String },

  #[error("Agent '{agent}' is not registered")]
  UnknownAgent { agent: String },

  #[error("Invalid pipeline step: {message}")]
  InvalidStep { message: String },

  #[error("Agent '{agent}' failed. Source: {source}")]
  HandlerFailure {
    agent: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Agent '{agent}' could not be constructed from its options. Source: {source}")]
  AgentConstruction {
    agent: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Parallel branch did not complete: {message}")]
  BranchAborted { message: String },

  #[error("Pipeline for source '{source_name}' exceeded its deadline of {deadline:?}")]
  DeadlineExceeded { source_name: String, deadline: Duration },

  #[error("Configuration error: {message}")]
  Config { message: String },

  #[error("Failed to read configuration: {0}")]
  Io(#[from] std::io::Error),

  #[error("Failed to start the pipeline runtime: {0}")]
  Runtime(String),
}

/// Stable discriminant of a `FlowError`, handy for callers that map failures
/// onto run statuses and for assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  PipelineNotFound,
  UnknownAgent,
  InvalidStep,
  HandlerFailure,
  AgentConstruction,
  BranchAborted,
  DeadlineExceeded,
  Config,
  Io,
  Runtime,
}

impl FlowError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      FlowError::PipelineNotFound { .. } => ErrorKind::PipelineNotFound,
      FlowError::UnknownAgent { .. } => ErrorKind::UnknownAgent,
      FlowError::InvalidStep { .. } => ErrorKind::InvalidStep,
      FlowError::HandlerFailure { .. } => ErrorKind::HandlerFailure,
      FlowError::AgentConstruction { .. } => ErrorKind::AgentConstruction,
      FlowError::BranchAborted { .. } => ErrorKind::BranchAborted,
      FlowError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
      FlowError::Config { .. } => ErrorKind::Config,
      FlowError::Io(_) => ErrorKind::Io,
      FlowError::Runtime(_) => ErrorKind::Runtime,
    }
  }

  pub(crate) fn invalid_step(message: impl Into<String>) -> Self {
    FlowError::InvalidStep { message: message.into() }
  }

  pub(crate) fn config(message: impl Into<String>) -> Self {
    FlowError::Config { message: message.into() }
  }

  /// Wraps an agent's own error with the agent name.
  ///
  /// An agent that runs other agentflow pieces may return a `HandlerFailure`
  /// itself; it stays reachable as the source, under this step's name.
  pub(crate) fn handler_failure(agent: &str, err: AnyhowError) -> Self {
    FlowError::HandlerFailure {
      agent: agent.to_string(),
      source: err,
    }
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handler_failure_keeps_agent_name_and_source() {
    let err = FlowError::handler_failure("http_fetch", anyhow::anyhow!("connection refused"));
    assert_eq!(err.kind(), ErrorKind::HandlerFailure);
    let msg = err.to_string();
    assert!(msg.contains("http_fetch"));
    assert!(msg.contains("connection refused"));
  }

  #[test]
  fn nested_handler_failure_keeps_outer_step_name() {
    let inner = FlowError::handler_failure("inner", anyhow::anyhow!("boom"));
    let outer = FlowError::handler_failure("outer", AnyhowError::new(inner));
    match outer {
      FlowError::HandlerFailure { agent, source } => {
        assert_eq!(agent, "outer");
        match source.downcast_ref::<FlowError>() {
          Some(FlowError::HandlerFailure { agent, .. }) => assert_eq!(agent, "inner"),
          other => panic!("expected inner HandlerFailure, got {:?}", other),
        }
      }
      other => panic!("expected HandlerFailure, got {:?}", other),
    }
  }
}
