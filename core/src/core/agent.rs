// agentflow/src/core/agent.rs

//! Defines the `Agent` capability: anything that can turn one `AgentContext`
//! into the next.
//!
//! Concrete agents (HTTP fetchers, parsers, normalizers, exporters) live
//! outside this crate. The engine only needs `run`.

use crate::core::context::{AgentContext, ValueMap};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Options handed to an agent factory when the registry builds an instance.
pub type AgentOptions = ValueMap;

/// A named step handler.
///
/// `run` takes ownership of its context and returns the (possibly new) context
/// the next step will see. Failures are plain `anyhow::Error`s; the orchestrator
/// attaches the agent name and propagates them without retrying.
///
/// Agents must treat values as immutable once inserted into a context they did
/// not create: the orchestrator hands out copies, not shared references, but
/// a copy is only as deep as the values it holds.
#[async_trait]
pub trait Agent: Send + Sync {
  fn name(&self) -> &str;

  async fn run(&self, ctx: AgentContext) -> anyhow::Result<AgentContext>;
}

type AgentFuture = Pin<Box<dyn Future<Output = anyhow::Result<AgentContext>> + Send>>;

/// Adapts a closure into an `Agent`.
///
/// ```ignore
/// let agent = FnAgent::new("stamp", |mut ctx| async move {
///   ctx.insert("stamped", true);
///   Ok(ctx)
/// });
/// ```
pub struct FnAgent {
  name: String,
  run_fn: Arc<dyn Fn(AgentContext) -> AgentFuture + Send + Sync>,
}

impl FnAgent {
  pub fn new<F, Fut>(name: impl Into<String>, run_fn: F) -> Self
  where
    F: Fn(AgentContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<AgentContext>> + Send + 'static,
  {
    Self {
      name: name.into(),
      run_fn: Arc::new(move |ctx| Box::pin(run_fn(ctx))),
    }
  }
}

impl std::fmt::Debug for FnAgent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FnAgent").field("name", &self.name).finish()
  }
}

#[async_trait]
impl Agent for FnAgent {
  fn name(&self) -> &str {
    &self.name
  }

  async fn run(&self, ctx: AgentContext) -> anyhow::Result<AgentContext> {
    (self.run_fn)(ctx).await
  }
}
