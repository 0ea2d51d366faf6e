// agentflow/src/tracking.rs

//! Caller-side run tracking.
//!
//! The orchestrator itself never records anything. `RunTracker` wraps an
//! `Orchestrator` the way a scheduler would: it makes sure the context carries
//! a `run_id`, writes a `Running` record, runs the pipeline, then writes a
//! `Success` or `Failed` record. Where the records go is up to the `RunSink`.

use crate::core::context::{AgentContext, RUN_ID_KEY};
use crate::error::FlowResult;
use crate::pipeline::execution::Orchestrator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{event, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Running,
  Success,
  Failed,
}

impl RunStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      RunStatus::Running => "running",
      RunStatus::Success => "success",
      RunStatus::Failed => "failed",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub run_id: String,
  pub source: String,
  pub status: RunStatus,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  pub duration_seconds: Option<i64>,
  pub stats: Option<Value>,
  pub metadata: Option<Value>,
  pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
  pub step_id: String,
  pub run_id: String,
  pub name: String,
  pub status: RunStatus,
  pub started_at: DateTime<Utc>,
  pub duration_seconds: Option<i64>,
}

impl StepRecord {
  /// New step record with an id of the form `<run_id>-<8 hex chars>`.
  pub fn new(run_id: &str, name: impl Into<String>, status: RunStatus, started_at: DateTime<Utc>) -> Self {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    Self {
      step_id: format!("{}-{}", run_id, suffix),
      run_id: run_id.to_string(),
      name: name.into(),
      status,
      started_at,
      duration_seconds: None,
    }
  }
}

/// Destination for run and step records (a database, an audit log, ...).
#[async_trait]
pub trait RunSink: Send + Sync {
  async fn record_run(&self, record: RunRecord) -> anyhow::Result<()>;

  async fn record_step(&self, record: StepRecord) -> anyhow::Result<()>;
}

/// Keeps every record in memory. Useful for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryRunSink {
  runs: Mutex<Vec<RunRecord>>,
  steps: Mutex<Vec<StepRecord>>,
}

impl InMemoryRunSink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Every run record written, oldest first.
  pub fn runs(&self) -> Vec<RunRecord> {
    self.runs.lock().clone()
  }

  pub fn steps(&self) -> Vec<StepRecord> {
    self.steps.lock().clone()
  }

  /// The most recent record for `run_id`.
  pub fn latest(&self, run_id: &str) -> Option<RunRecord> {
    self.runs.lock().iter().rev().find(|r| r.run_id == run_id).cloned()
  }
}

#[async_trait]
impl RunSink for InMemoryRunSink {
  async fn record_run(&self, record: RunRecord) -> anyhow::Result<()> {
    self.runs.lock().push(record);
    Ok(())
  }

  async fn record_step(&self, record: StepRecord) -> anyhow::Result<()> {
    self.steps.lock().push(record);
    Ok(())
  }
}

/// Runs pipelines and reports their lifecycle to a `RunSink`.
#[derive(Clone)]
pub struct RunTracker {
  orchestrator: Orchestrator,
  sink: Arc<dyn RunSink>,
}

impl RunTracker {
  pub fn new(orchestrator: Orchestrator, sink: Arc<dyn RunSink>) -> Self {
    Self { orchestrator, sink }
  }

  /// Runs `source_name` and records its start and outcome.
  ///
  /// The pipeline's own result is returned unchanged. Sink failures are logged
  /// and never turn a successful run into a failed one.
  pub async fn run(&self, source_name: &str, mut initial_context: AgentContext) -> FlowResult<AgentContext> {
    let run_id = match initial_context.run_id() {
      Some(run_id) => run_id.to_string(),
      None => {
        let generated = Uuid::new_v4().to_string();
        initial_context.set_metadata(RUN_ID_KEY, generated.clone());
        generated
      }
    };

    let started_at = Utc::now();
    self
      .write_run(RunRecord {
        run_id: run_id.clone(),
        source: source_name.to_string(),
        status: RunStatus::Running,
        started_at,
        finished_at: None,
        duration_seconds: None,
        stats: None,
        metadata: Some(Value::Object(initial_context.metadata.clone())),
        error: None,
      })
      .await;

    let result = self.orchestrator.run_pipeline(source_name, initial_context).await;

    let finished_at = Utc::now();
    let duration_seconds = Some((finished_at - started_at).num_seconds());
    let record = match &result {
      Ok(ctx) => RunRecord {
        run_id: run_id.clone(),
        source: source_name.to_string(),
        status: RunStatus::Success,
        started_at,
        finished_at: Some(finished_at),
        duration_seconds,
        stats: Some(json!({
          "data_keys": ctx.data.len(),
          "metadata_keys": ctx.metadata.len(),
        })),
        metadata: Some(Value::Object(ctx.metadata.clone())),
        error: None,
      },
      Err(err) => RunRecord {
        run_id: run_id.clone(),
        source: source_name.to_string(),
        status: RunStatus::Failed,
        started_at,
        finished_at: Some(finished_at),
        duration_seconds,
        stats: None,
        metadata: None,
        error: Some(err.to_string()),
      },
    };
    event!(Level::INFO, run_id = %run_id, source = %source_name, status = record.status.as_str(), "Run finished.");
    self.write_run(record).await;

    result
  }

  /// Records one step of `run_id` and returns its generated step id.
  pub async fn record_step(
    &self,
    run_id: &str,
    name: &str,
    status: RunStatus,
    started_at: DateTime<Utc>,
    duration_seconds: Option<i64>,
  ) -> anyhow::Result<String> {
    let mut record = StepRecord::new(run_id, name, status, started_at);
    record.duration_seconds = duration_seconds;
    let step_id = record.step_id.clone();
    self.sink.record_step(record).await?;
    Ok(step_id)
  }

  async fn write_run(&self, record: RunRecord) {
    let run_id = record.run_id.clone();
    if let Err(err) = self.sink.record_run(record).await {
      event!(Level::WARN, run_id = %run_id, error = %err, "Failed to record run.");
    }
  }
}
