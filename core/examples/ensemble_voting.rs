// agentflow/examples/ensemble_voting.rs

use agentflow::{AgentContext, AgentOptions, AgentRegistry, FlowError, FnAgent, Orchestrator, PipelinesConfig, StepDescriptor};
use std::sync::Arc;
use tracing::info;

/// A normalizer that reports how confident it is in its output.
fn register_normalizer(registry: &AgentRegistry, name: &'static str, score: f64, label: &'static str) {
  registry.register_fn(name, move |_opts: &AgentOptions| {
    Ok(FnAgent::new(name, move |mut ctx: AgentContext| async move {
      ctx.insert("normalized_name", label);
      ctx.insert("quality_score", score);
      Ok::<_, anyhow::Error>(ctx)
    }))
  });
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Ensemble Voting Example ---");

  let registry = Arc::new(AgentRegistry::new());
  register_normalizer(&registry, "llm_normalizer", 0.72, "Paracetamol 500mg Tab");
  register_normalizer(&registry, "qc_rules", 0.91, "PARACETAMOL 500 MG TABLET");
  register_normalizer(&registry, "fallback_rules", 0.40, "paracetamol");

  let candidates = || {
    vec![
      StepDescriptor::agent("llm_normalizer"),
      StepDescriptor::agent("qc_rules"),
      StepDescriptor::agent("fallback_rules"),
    ]
  };
  let config = PipelinesConfig::new()
    .with_source("best", vec![StepDescriptor::ensemble("best_score", candidates())])
    .with_source("first", vec![StepDescriptor::ensemble("first_success", candidates())]);
  let orchestrator = Orchestrator::from_config(registry, config);

  for source in ["best", "first"] {
    let mut ctx = AgentContext::new();
    ctx.insert("raw_name", "paracetamol 500mg tab.");
    let result = orchestrator.run_pipeline(source, ctx).await?;
    info!(
      source,
      normalized = ?result.get("normalized_name"),
      score = ?result.get("quality_score"),
      "Ensemble picked a result."
    );
  }

  info!("--- Ensemble Voting Example End ---");
  Ok(())
}
