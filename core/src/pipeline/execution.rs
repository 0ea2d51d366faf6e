// agentflow/src/pipeline/execution.rs

//! Contains the `Orchestrator` and its `run_pipeline()` entry points.
//!
//! The orchestrator walks a source's step list in order. Agent steps run on the
//! calling task; parallel blocks fan out onto tokio tasks (see `parallel.rs`);
//! ensemble blocks evaluate candidates one after another (see `ensemble.rs`).
//! Every run returns only once the whole pipeline finished or failed.

use crate::core::context::AgentContext;
use crate::core::step::{AgentStep, Step, StepDescriptor};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::definition::{PipelineSource, PipelinesConfig};
use crate::registry::AgentRegistry;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{event, instrument, span, Instrument, Level};

/// Boxed so that blocks can recurse into `execute_step`.
pub(crate) type StepFuture<'a> = Pin<Box<dyn Future<Output = FlowResult<AgentContext>> + Send + 'a>>;

/// Interprets pipeline definitions against an `AgentRegistry`.
///
/// Cloning is cheap (two `Arc`s); parallel branches hold their own clone.
#[derive(Clone)]
pub struct Orchestrator {
  registry: Arc<AgentRegistry>,
  source: Arc<dyn PipelineSource>,
}

impl Orchestrator {
  pub fn new(registry: Arc<AgentRegistry>, source: Arc<dyn PipelineSource>) -> Self {
    Self { registry, source }
  }

  pub fn from_config(registry: Arc<AgentRegistry>, config: PipelinesConfig) -> Self {
    Self::new(registry, Arc::new(config))
  }

  pub fn registry(&self) -> &Arc<AgentRegistry> {
    &self.registry
  }

  /// Runs the pipeline configured for `source_name` starting from `initial_context`.
  ///
  /// Must be polled inside a tokio runtime (parallel blocks spawn tasks).
  ///
  /// # Errors
  /// - `PipelineNotFound` when no pipeline exists for `source_name`.
  /// - `InvalidStep` when a step descriptor is malformed (reported when that step is reached).
  /// - `UnknownAgent` / `AgentConstruction` when a step's agent cannot be built.
  /// - `HandlerFailure` when an agent's `run` fails.
  #[instrument(
    name = "Orchestrator::run_pipeline",
    skip(self, initial_context),
    fields(run_id = initial_context.run_id().unwrap_or_default()),
    err(Display)
  )]
  pub async fn run_pipeline(&self, source_name: &str, initial_context: AgentContext) -> FlowResult<AgentContext> {
    let pipeline = self.load_pipeline(source_name)?;
    event!(Level::DEBUG, num_steps = pipeline.len(), "Pipeline execution starting.");

    let mut context = initial_context;
    for (step_idx, descriptor) in pipeline.iter().enumerate() {
      let step = Step::try_from(descriptor).map_err(|err| {
        event!(Level::ERROR, step_index = step_idx, error = %err, "Step descriptor rejected.");
        err
      })?;

      let step_span = span!(
        Level::INFO,
        "pipeline_step_execution",
        step_index = step_idx,
        step_kind = step.kind()
      );
      context = self.execute_step(&step, context).instrument(step_span).await?;
    }

    event!(Level::DEBUG, "Pipeline execution completed successfully.");
    Ok(context)
  }

  /// Like [`run_pipeline`](Self::run_pipeline), failing with `DeadlineExceeded` when the
  /// whole run takes longer than `deadline`.
  ///
  /// Parallel branches still in flight are aborted when the deadline hits. A
  /// handler running on the calling task is abandoned at its next await point.
  pub async fn run_pipeline_with_deadline(
    &self,
    source_name: &str,
    initial_context: AgentContext,
    deadline: Duration,
  ) -> FlowResult<AgentContext> {
    match tokio::time::timeout(deadline, self.run_pipeline(source_name, initial_context)).await {
      Ok(result) => result,
      Err(_) => {
        event!(Level::ERROR, source = %source_name, ?deadline, "Pipeline exceeded its deadline.");
        Err(FlowError::DeadlineExceeded {
          source_name: source_name.to_string(),
          deadline,
        })
      }
    }
  }

  /// Blocking entry point for synchronous callers such as schedulers.
  ///
  /// Builds a dedicated multi-threaded runtime for the run. Must not be called
  /// from within an async context.
  pub fn run_pipeline_blocking(&self, source_name: &str, initial_context: AgentContext) -> FlowResult<AgentContext> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .thread_name("agentflow-worker")
      .build()
      .map_err(|e| FlowError::Runtime(e.to_string()))?;
    runtime.block_on(self.run_pipeline(source_name, initial_context))
  }

  fn load_pipeline(&self, source_name: &str) -> FlowResult<Vec<StepDescriptor>> {
    self.source.pipeline(source_name).ok_or_else(|| {
      event!(Level::ERROR, source = %source_name, "No pipeline configured for source.");
      FlowError::PipelineNotFound {
        source_name: source_name.to_string(),
      }
    })
  }

  /// Executes one step of any kind against `ctx`.
  pub(crate) fn execute_step<'a>(&'a self, step: &'a Step, ctx: AgentContext) -> StepFuture<'a> {
    Box::pin(async move {
      match step {
        Step::Agent(agent_step) => self.run_agent(agent_step, ctx).await,
        Step::Parallel(children) => self.run_parallel(children, ctx).await,
        Step::Ensemble(block) => self.run_ensemble(block, ctx).await,
      }
    })
  }

  async fn run_agent(&self, step: &AgentStep, ctx: AgentContext) -> FlowResult<AgentContext> {
    let mut options = self.source.agent_options(&step.name);
    options.extend(step.config.clone());
    let agent = self.registry.build(&step.name, &options)?;

    let started = Instant::now();
    event!(Level::INFO, agent = %step.name, "Running agent.");
    match agent.run(ctx).await {
      Ok(updated) => {
        event!(
          Level::INFO,
          agent = %step.name,
          elapsed_ms = started.elapsed().as_millis() as u64,
          "Agent completed."
        );
        Ok(updated)
      }
      Err(err) => {
        event!(
          Level::ERROR,
          agent = %step.name,
          elapsed_ms = started.elapsed().as_millis() as u64,
          error = %err,
          "Agent failed."
        );
        Err(FlowError::handler_failure(&step.name, err))
      }
    }
  }
}

impl std::fmt::Debug for Orchestrator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Orchestrator").field("registry", &self.registry).finish_non_exhaustive()
  }
}
