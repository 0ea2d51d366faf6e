// agentflow/examples/tracked_run.rs

use agentflow::{
  AgentContext, AgentOptions, AgentRegistry, FnAgent, InMemoryRunSink, Orchestrator, PipelinesConfig, RunStatus,
  RunTracker, StepDescriptor,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Tracked Run Example ---");

  let registry = Arc::new(AgentRegistry::new());
  registry.register_fn("http_fetch", |_opts: &AgentOptions| {
    Ok(FnAgent::new("http_fetch", |mut ctx: AgentContext| async move {
      ctx.insert("raw_html", "<html/>");
      Ok::<_, anyhow::Error>(ctx)
    }))
  });
  registry.register_fn("db_export", |_opts: &AgentOptions| {
    Ok(FnAgent::new("db_export", |_ctx: AgentContext| async move {
      Err::<AgentContext, _>(anyhow::anyhow!("connection to warehouse refused"))
    }))
  });

  let config = PipelinesConfig::new()
    .with_source("fetch_only", vec![StepDescriptor::agent("http_fetch")])
    .with_source("full", vec![StepDescriptor::agent("http_fetch"), StepDescriptor::agent("db_export")]);

  let sink = Arc::new(InMemoryRunSink::new());
  let tracker = RunTracker::new(Orchestrator::from_config(registry, config), sink.clone());

  let ok = tracker.run("fetch_only", AgentContext::new()).await?;
  if let Some(run_id) = ok.run_id() {
    let step_id = tracker
      .record_step(run_id, "http_fetch", RunStatus::Success, Utc::now(), Some(0))
      .await?;
    info!(%run_id, %step_id, "Recorded step.");
  }

  if let Err(err) = tracker.run("full", AgentContext::for_run("nightly-001", "2024-06-01")).await {
    warn!(error = %err, kind = ?err.kind(), "Run failed as expected.");
  }

  for record in sink.runs() {
    info!(
      run_id = %record.run_id,
      source = %record.source,
      status = record.status.as_str(),
      error = ?record.error,
      "Run record."
    );
  }

  info!("--- Tracked Run Example End ---");
  Ok(())
}
