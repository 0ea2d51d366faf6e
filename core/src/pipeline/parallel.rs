// agentflow/src/pipeline/parallel.rs

//! Fan-out execution of `parallel` blocks.
//!
//! Each sibling gets its own copy of the context, taken before any sibling is
//! spawned. Results are merged into an accumulator in completion order, so for
//! keys written by more than one sibling the surviving value depends on which
//! finished last. Per-branch snapshots are kept under
//! `metadata["parallel_results"]`, keyed by the sibling's position in the block.

use crate::core::context::{AgentContext, ValueMap, PARALLEL_RESULTS_KEY};
use crate::core::step::Step;
use crate::error::{FlowError, FlowResult};
use crate::pipeline::execution::Orchestrator;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::task::JoinSet;
use tracing::{event, span, Instrument, Level};

impl Orchestrator {
  pub(crate) async fn run_parallel(&self, children: &[Step], ctx: AgentContext) -> FlowResult<AgentContext> {
    event!(Level::INFO, branches = children.len(), "Running parallel block.");

    let copies: Vec<AgentContext> = children.iter().map(|_| ctx.copy()).collect();

    // Dropping the set (early return on failure, or a deadline) aborts whatever is still running.
    let mut branches: JoinSet<(usize, FlowResult<AgentContext>)> = JoinSet::new();
    for (branch_idx, (child, branch_ctx)) in children.iter().cloned().zip(copies).enumerate() {
      let orchestrator = self.clone();
      let branch_span = span!(Level::DEBUG, "parallel_branch", branch_index = branch_idx, step_kind = child.kind());
      branches.spawn(
        async move {
          let result = orchestrator.execute_step(&child, branch_ctx).await;
          (branch_idx, result)
        }
        .instrument(branch_span),
      );
    }

    let fan_out_data = ctx.data.clone();
    let mut merged = ctx;
    let mut branch_results: BTreeMap<usize, Value> = BTreeMap::new();
    let mut written_by: HashMap<String, usize> = HashMap::new();

    while let Some(joined) = branches.join_next().await {
      let (branch_idx, result) = joined.map_err(|join_err| {
        event!(Level::ERROR, error = %join_err, "Parallel branch panicked or was cancelled.");
        FlowError::BranchAborted {
          message: join_err.to_string(),
        }
      })?;

      let branch_ctx = result.map_err(|err| {
        event!(Level::ERROR, branch_index = branch_idx, error = %err, "Parallel branch failed, aborting block.");
        err
      })?;
      event!(Level::DEBUG, branch_index = branch_idx, "Parallel branch completed, merging.");

      for (key, value) in &branch_ctx.data {
        if fan_out_data.get(key) == Some(value) {
          continue;
        }
        if let Some(previous_idx) = written_by.insert(key.clone(), branch_idx) {
          event!(
            Level::WARN,
            key = %key,
            first_branch = previous_idx,
            second_branch = branch_idx,
            "Key written by more than one parallel branch; keeping the value merged last."
          );
        }
      }

      // Earlier blocks' results ride along in every copy and are not part of this branch's output.
      branch_results.insert(branch_idx, branch_ctx.snapshot_without(&[PARALLEL_RESULTS_KEY]));
      merged.merge_owned(branch_ctx);
    }

    let parallel_results: ValueMap = branch_results
      .into_iter()
      .map(|(branch_idx, snapshot)| (branch_idx.to_string(), snapshot))
      .collect();
    merged.set_metadata(PARALLEL_RESULTS_KEY, Value::Object(parallel_results));

    event!(Level::DEBUG, "Parallel block merged.");
    Ok(merged)
  }
}

#[cfg(test)]
mod tests {
  use crate::core::agent::{AgentOptions, FnAgent};
  use crate::core::context::{AgentContext, PARALLEL_RESULTS_KEY};
  use crate::core::step::StepDescriptor;
  use crate::pipeline::definition::PipelinesConfig;
  use crate::pipeline::execution::Orchestrator;
  use crate::registry::AgentRegistry;
  use serde_json::json;
  use std::sync::Arc;

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn empty_parallel_block_records_no_results() {
    let registry = Arc::new(AgentRegistry::new());
    let config = PipelinesConfig::new().with_source("s", vec![StepDescriptor::parallel(vec![])]);
    let orchestrator = Orchestrator::from_config(registry, config);

    let mut initial = AgentContext::new();
    initial.insert("kept", 1);
    let out = orchestrator.run_pipeline("s", initial).await.unwrap();
    assert_eq!(out.get("kept"), Some(&json!(1)));
    assert_eq!(out.get_metadata(PARALLEL_RESULTS_KEY), Some(&json!({})));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn siblings_do_not_see_each_other() {
    let registry = Arc::new(AgentRegistry::new());
    for name in ["left", "right"] {
      registry.register_fn(name, move |_opts: &AgentOptions| {
        Ok(FnAgent::new(name, move |mut ctx: AgentContext| async move {
          let other = if name == "left" { "right" } else { "left" };
          let saw_other = ctx.contains_key(other);
          ctx.insert(name, saw_other);
          Ok::<_, anyhow::Error>(ctx)
        }))
      });
    }
    let config = PipelinesConfig::new().with_source(
      "s",
      vec![StepDescriptor::parallel(vec![StepDescriptor::agent("left"), StepDescriptor::agent("right")])],
    );
    let orchestrator = Orchestrator::from_config(registry, config);

    let out = orchestrator.run_pipeline("s", AgentContext::new()).await.unwrap();
    assert_eq!(out.get("left"), Some(&json!(false)));
    assert_eq!(out.get("right"), Some(&json!(false)));
  }
}
