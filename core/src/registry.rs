// agentflow/src/registry.rs

//! Defines `AgentRegistry`, the name-keyed map from agent names to factories.
//!
//! The registry is an ordinary owned object. Build one at startup, register the
//! agents the deployment needs, then share it (behind an `Arc`) with every
//! `Orchestrator` that should resolve names against it. Separate registries
//! never observe each other, which keeps tests isolated.

use crate::core::agent::{Agent, AgentOptions};
use crate::error::{FlowError, FlowResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Builds a fresh agent from its merged options.
pub type AgentFactory = Arc<dyn Fn(&AgentOptions) -> anyhow::Result<Box<dyn Agent>> + Send + Sync>;

#[derive(Default)]
pub struct AgentRegistry {
  factories: RwLock<HashMap<String, AgentFactory>>,
  builtins_installed: AtomicBool,
}

impl AgentRegistry {
  /// Creates a new, empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Installs or replaces the factory for `name`.
  ///
  /// Overwriting is allowed (last registration wins) but logged at WARN.
  pub fn register(&self, name: impl Into<String>, factory: AgentFactory) {
    let name = name.into();
    let previous = self.factories.write().insert(name.clone(), factory);
    if previous.is_some() {
      event!(Level::WARN, agent = %name, "Overriding existing agent registration.");
    } else {
      event!(Level::DEBUG, agent = %name, "Registered agent.");
    }
  }

  /// Registers a closure factory.
  pub fn register_fn<F, A>(&self, name: impl Into<String>, factory: F)
  where
    F: Fn(&AgentOptions) -> anyhow::Result<A> + Send + Sync + 'static,
    A: Agent + 'static,
  {
    let factory: AgentFactory = Arc::new(move |options: &AgentOptions| {
      let agent = factory(options)?;
      Ok(Box::new(agent) as Box<dyn Agent>)
    });
    self.register(name, factory);
  }

  /// Constructs a new agent instance for `name`, configured with `options`.
  #[instrument(name = "AgentRegistry::build", skip(self, options), err(Display))]
  pub fn build(&self, name: &str, options: &AgentOptions) -> FlowResult<Box<dyn Agent>> {
    // Clone the factory out so the lock is not held while user code runs.
    let factory = self.factories.read().get(name).cloned().ok_or_else(|| {
      event!(Level::ERROR, "Agent is not registered.");
      FlowError::UnknownAgent { agent: name.to_string() }
    })?;

    factory(options).map_err(|source| FlowError::AgentConstruction {
      agent: name.to_string(),
      source,
    })
  }

  pub fn contains(&self, name: &str) -> bool {
    self.factories.read().contains_key(name)
  }

  /// Sorted snapshot of the registered names.
  pub fn list(&self) -> Vec<String> {
    let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.factories.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.factories.read().is_empty()
  }

  /// Runs `installer` once per registry (or again when `force` is set).
  ///
  /// Returns whether the installer ran. Meant for the builtin agent set a
  /// process registers at startup; running it twice would only produce
  /// overwrite warnings.
  pub fn install_builtins<F>(&self, force: bool, installer: F) -> bool
  where
    F: FnOnce(&AgentRegistry),
  {
    let first_time = self
      .builtins_installed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok();
    if !first_time && !force {
      event!(Level::TRACE, "Builtin agents already installed, skipping.");
      return false;
    }
    installer(self);
    true
  }

  /// Drops every registration. Intended for tests.
  pub fn reset(&self) {
    self.factories.write().clear();
    self.builtins_installed.store(false, Ordering::Release);
  }
}

impl std::fmt::Debug for AgentRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AgentRegistry").field("agents", &self.list()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::agent::FnAgent;
  use crate::core::context::AgentContext;
  use crate::error::ErrorKind;

  fn constant_agent(name: &'static str, marker: &'static str) -> FnAgent {
    FnAgent::new(name, move |mut ctx: AgentContext| async move {
      ctx.insert("marker", marker);
      Ok::<_, anyhow::Error>(ctx)
    })
  }

  #[test]
  fn unknown_agent_is_reported() {
    let registry = AgentRegistry::new();
    let err = registry.build("missing", &AgentOptions::new()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::UnknownAgent);
  }

  #[test]
  fn list_is_sorted() {
    let registry = AgentRegistry::new();
    registry.register_fn("zeta", |_opts: &AgentOptions| Ok(constant_agent("zeta", "z")));
    registry.register_fn("alpha", |_opts: &AgentOptions| Ok(constant_agent("alpha", "a")));
    assert_eq!(registry.list(), vec!["alpha".to_string(), "zeta".to_string()]);
    assert_eq!(registry.len(), 2);
  }

  #[test]
  fn factory_errors_become_construction_errors() {
    let registry = AgentRegistry::new();
    registry.register_fn("strict", |opts: &AgentOptions| {
      if opts.contains_key("url") {
        Ok(constant_agent("strict", "ok"))
      } else {
        Err(anyhow::anyhow!("missing 'url' option"))
      }
    });
    let err = registry.build("strict", &AgentOptions::new()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::AgentConstruction);
    assert!(err.to_string().contains("strict"));
  }

  #[test]
  fn install_builtins_is_idempotent_unless_forced() {
    let registry = AgentRegistry::new();
    let mut runs = 0;
    assert!(registry.install_builtins(false, |_| runs += 1));
    assert!(!registry.install_builtins(false, |_| runs += 1));
    assert!(registry.install_builtins(true, |_| runs += 1));
    assert_eq!(runs, 2);

    registry.reset();
    assert!(registry.install_builtins(false, |_| runs += 1));
    assert_eq!(runs, 3);
  }
}
