pub mod agent;
pub mod context;
pub mod step;

// Re-export key types for easier access from other agentflow modules (and lib.rs)
pub use agent::{Agent, AgentOptions, FnAgent};
pub use context::{AgentContext, ValueMap};
pub use step::{AgentStep, EnsembleStep, EnsembleStrategy, Step, StepDescriptor};
