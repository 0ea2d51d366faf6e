// src/lib.rs

//! agentflow: an ASYNC orchestration engine for config-driven agent pipelines.
//!
//! A pipeline is an ordered list of steps read from configuration. Each step is
//! one of:
//!  - an agent step, resolved by name through an `AgentRegistry` and run on the
//!    current context;
//!  - a parallel block, whose siblings run concurrently on independent copies of
//!    the context and are merged back once all of them completed;
//!  - an ensemble block, whose candidates run one after another and are reduced
//!    to a single winning context by a strategy (`first_success`, `best_score`).
//!
//! The state threaded through a run is an `AgentContext` (JSON `data` plus JSON
//! `metadata`).

pub mod core;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod tracking;

// --- Re-exports for the Public API ---

pub use crate::core::agent::{Agent, AgentOptions, FnAgent};
pub use crate::core::context::{AgentContext, ValueMap, PARALLEL_RESULTS_KEY};
pub use crate::core::step::{EnsembleStrategy, Step, StepDescriptor};

pub use crate::pipeline::definition::{AgentDefaults, PipelineSource, PipelinesConfig, SourceConfig};
pub use crate::pipeline::execution::Orchestrator;

pub use crate::registry::{AgentFactory, AgentRegistry};

pub use crate::error::{ErrorKind, FlowError, FlowResult};

pub use crate::tracking::{InMemoryRunSink, RunRecord, RunSink, RunStatus, RunTracker, StepRecord};

/*
    Core Workflow:
    1. Create an `AgentRegistry` and register a factory per agent name
       (`registry.register_fn("http_fetch", |opts| Ok(HttpFetch::new(opts)?))`).
    2. Load a `PipelinesConfig` (`loader::load_dir(loader::config_dir())?`).
    3. Build an `Orchestrator::from_config(Arc::new(registry), config)`.
    4. Create the initial context (`AgentContext::for_run(run_id, execution_date)`).
    5. `orchestrator.run_pipeline("alfabeta", ctx).await` (or `run_pipeline_blocking`
       from synchronous code), optionally through a `RunTracker`.
*/
