// agentflow/src/pipeline/mod.rs

//! Defines the `Orchestrator`, the pipeline configuration it reads, and the
//! execution logic for sequential, parallel and ensemble steps.

pub mod definition;
pub mod ensemble;
pub mod execution;
pub mod parallel;

// Re-export the main types
pub use definition::{AgentDefaults, PipelineSource, PipelinesConfig, SourceConfig};
pub use ensemble::candidate_score;
pub use execution::Orchestrator;
