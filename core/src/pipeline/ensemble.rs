// agentflow/src/pipeline/ensemble.rs

//! Candidate selection for `ensemble` blocks.
//!
//! Candidates run one at a time, each on its own copy of the incoming context.
//! A failing candidate aborts the block under every strategy.

use crate::core::context::AgentContext;
use crate::core::step::{EnsembleStep, EnsembleStrategy};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::execution::Orchestrator;
use serde_json::Value;
use tracing::{event, Level};

/// Data key checked first when scoring a candidate.
pub const QUALITY_SCORE_KEY: &str = "quality_score";
/// Dotted path checked when `quality_score` is absent.
pub const QUALITY_SCORE_PATH: &str = "quality.score";

/// Score of a candidate's resulting context: `data["quality_score"]`, else
/// `data.quality.score`, else `0`. Non-numeric scores count as `0`.
pub fn candidate_score(ctx: &AgentContext) -> f64 {
  let raw = ctx
    .get(QUALITY_SCORE_KEY)
    .cloned()
    .unwrap_or_else(|| ctx.get_nested_or(QUALITY_SCORE_PATH, Value::from(0)));
  match raw.as_f64() {
    Some(score) => score,
    None => {
      event!(Level::WARN, score = %raw, "Non-numeric candidate score, counting it as 0.");
      0.0
    }
  }
}

impl Orchestrator {
  pub(crate) async fn run_ensemble(&self, block: &EnsembleStep, ctx: AgentContext) -> FlowResult<AgentContext> {
    if block.candidates.is_empty() {
      return Err(FlowError::invalid_step("ensemble block requires at least one candidate"));
    }
    event!(
      Level::INFO,
      strategy = %block.strategy,
      candidates = block.candidates.len(),
      "Running ensemble."
    );

    match block.strategy {
      EnsembleStrategy::FirstSuccess => {
        // Only the first candidate is ever evaluated.
        let first = &block.candidates[0];
        self.execute_step(first, ctx.copy()).await
      }
      EnsembleStrategy::BestScore => {
        let mut best_score = f64::NEG_INFINITY;
        let mut best: Option<(usize, AgentContext)> = None;

        for (candidate_idx, candidate) in block.candidates.iter().enumerate() {
          let result = self.execute_step(candidate, ctx.copy()).await?;
          let score = candidate_score(&result);
          event!(Level::DEBUG, candidate_index = candidate_idx, score, "Ensemble candidate scored.");
          // Strictly greater: ties keep the earlier candidate.
          if score > best_score {
            best_score = score;
            best = Some((candidate_idx, result));
          }
        }

        match best {
          Some((winner_idx, winner)) => {
            event!(Level::INFO, winner_index = winner_idx, score = best_score, "Ensemble winner selected.");
            Ok(winner)
          }
          None => {
            event!(Level::WARN, "No ensemble candidate produced a comparable score, keeping the incoming context.");
            Ok(ctx)
          }
        }
      }
    }
  }
}
