// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use agentflow::{AgentContext, AgentOptions, AgentRegistry, FnAgent, Orchestrator, PipelinesConfig, StepDescriptor};
use serde_json::{json, Value};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;

pub const TRACE_KEY: &str = "trace";

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Appends `name` to the `trace` array in `data`.
pub fn push_trace(ctx: &mut AgentContext, name: &str) {
  let mut trace = ctx
    .get(TRACE_KEY)
    .and_then(Value::as_array)
    .cloned()
    .unwrap_or_default();
  trace.push(json!(name));
  ctx.insert(TRACE_KEY, Value::Array(trace));
}

pub fn trace_of(ctx: &AgentContext) -> Vec<String> {
  ctx
    .get(TRACE_KEY)
    .and_then(Value::as_array)
    .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
    .unwrap_or_default()
}

// --- Common Agent Registrations ---

/// `name` appends itself to the trace and sets `data[key] = value`.
pub fn register_marker(registry: &AgentRegistry, name: &'static str, key: &'static str, value: Value) {
  registry.register_fn(name, move |_opts: &AgentOptions| {
    let value = value.clone();
    Ok(FnAgent::new(name, move |mut ctx: AgentContext| {
      let value = value.clone();
      async move {
        push_trace(&mut ctx, name);
        ctx.insert(key, value);
        Ok::<_, anyhow::Error>(ctx)
      }
    }))
  });
}

/// `name` sleeps for `delay`, then sets `data[key] = name` and records the
/// global completion order in `metadata["finished_<name>"]`.
pub fn register_sleeper(
  registry: &AgentRegistry,
  name: &'static str,
  key: &'static str,
  delay: Duration,
  finish_counter: Arc<AtomicUsize>,
) {
  registry.register_fn(name, move |_opts: &AgentOptions| {
    let finish_counter = finish_counter.clone();
    Ok(FnAgent::new(name, move |mut ctx: AgentContext| {
      let finish_counter = finish_counter.clone();
      async move {
        tokio::time::sleep(delay).await;
        let position = finish_counter.fetch_add(1, Ordering::SeqCst);
        ctx.insert(key, name);
        ctx.set_metadata(format!("finished_{}", name), position);
        Ok::<_, anyhow::Error>(ctx)
      }
    }))
  });
}

/// `name` writes `quality_score = score` and `picked = name`, counting its invocations.
pub fn register_scorer(registry: &AgentRegistry, name: &'static str, score: Value, calls: Arc<AtomicUsize>) {
  registry.register_fn(name, move |_opts: &AgentOptions| {
    let score = score.clone();
    let calls = calls.clone();
    Ok(FnAgent::new(name, move |mut ctx: AgentContext| {
      let score = score.clone();
      let calls = calls.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        push_trace(&mut ctx, name);
        ctx.insert("quality_score", score);
        ctx.insert("picked", name);
        Ok::<_, anyhow::Error>(ctx)
      }
    }))
  });
}

/// `name` always fails with `message`.
pub fn register_failing(registry: &AgentRegistry, name: &'static str, message: &'static str) {
  registry.register_fn(name, move |_opts: &AgentOptions| {
    Ok(FnAgent::new(name, move |_ctx: AgentContext| async move {
      Err::<AgentContext, _>(anyhow::anyhow!(message))
    }))
  });
}

/// `name` copies the options it was built with into `data["options"]`.
pub fn register_option_echo(registry: &AgentRegistry, name: &'static str) {
  registry.register_fn(name, move |opts: &AgentOptions| {
    let options = Value::Object(opts.clone());
    Ok(FnAgent::new(name, move |mut ctx: AgentContext| {
      let options = options.clone();
      async move {
        ctx.insert("options", options);
        Ok::<_, anyhow::Error>(ctx)
      }
    }))
  });
}

pub fn orchestrator_for(registry: Arc<AgentRegistry>, source: &str, steps: Vec<StepDescriptor>) -> Orchestrator {
  Orchestrator::from_config(registry, PipelinesConfig::new().with_source(source, steps))
}

pub fn agent(name: &str) -> StepDescriptor {
  StepDescriptor::agent(name)
}
