// agentflow/examples/basic_pipeline.rs

use agentflow::{loader, AgentContext, AgentOptions, AgentRegistry, FlowError, FnAgent, Orchestrator};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const PIPELINES: &str = r#"
[defaults.common]
timeout_secs = 30

[sources.alfabeta]
description = "pharma price scraper"
pipeline = [
  { agent = "http_fetch", config = { url = "https://example.org/prices" } },
  { parallel = [ { agent = "html_parse" }, { agent = "pcid_match" } ] },
  { agent = "db_export" },
]
"#;

fn register_agents(registry: &AgentRegistry) {
  registry.register_fn("http_fetch", |opts: &AgentOptions| {
    let url = opts.get("url").and_then(|v| v.as_str()).unwrap_or("about:blank").to_string();
    Ok(FnAgent::new("http_fetch", move |mut ctx: AgentContext| {
      let url = url.clone();
      async move {
        info!(%url, "Fetching.");
        ctx.insert("raw_html", "<tr><td>A1</td><td>12.50</td></tr>");
        Ok::<_, anyhow::Error>(ctx)
      }
    }))
  });

  registry.register_fn("html_parse", |_opts: &AgentOptions| {
    Ok(FnAgent::new("html_parse", |mut ctx: AgentContext| async move {
      ctx.insert("rows", json!([{"sku": "A1", "price": 12.5}]));
      Ok::<_, anyhow::Error>(ctx)
    }))
  });

  registry.register_fn("pcid_match", |_opts: &AgentOptions| {
    Ok(FnAgent::new("pcid_match", |mut ctx: AgentContext| async move {
      ctx.insert("pcid_matches", json!({"A1": "PCID-0001"}));
      Ok::<_, anyhow::Error>(ctx)
    }))
  });

  registry.register_fn("db_export", |_opts: &AgentOptions| {
    Ok(FnAgent::new("db_export", |mut ctx: AgentContext| async move {
      let rows = ctx.get("rows").and_then(|v| v.as_array()).map(|r| r.len()).unwrap_or(0);
      info!(rows, "Exporting.");
      ctx.insert("exported_rows", rows);
      Ok::<_, anyhow::Error>(ctx)
    }))
  });
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  let registry = Arc::new(AgentRegistry::new());
  register_agents(&registry);

  let config = loader::parse_toml(PIPELINES)?;
  config.validate()?;
  let orchestrator = Orchestrator::from_config(registry, config);

  let result = orchestrator
    .run_pipeline("alfabeta", AgentContext::for_run("demo-run", "2024-06-01"))
    .await?;

  info!(data = %serde_json::Value::Object(result.data.clone()), "Final data.");
  info!(
    parallel_results = ?result.get_metadata(agentflow::PARALLEL_RESULTS_KEY),
    "Per-branch snapshots."
  );
  info!("--- Basic Pipeline Example End ---");
  Ok(())
}
