// agentflow/src/loader.rs

//! Loads `PipelinesConfig` from declarative files.
//!
//! TOML is the primary format, JSON is accepted as well. The file format is
//! picked from the extension.

use crate::error::{FlowError, FlowResult};
use crate::pipeline::definition::{AgentDefaults, PipelinesConfig};
use std::path::{Path, PathBuf};
use tracing::{event, Level};

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "AGENTFLOW_CONFIG_DIR";

const PIPELINES_STEM: &str = "pipelines";
const DEFAULTS_STEM: &str = "defaults";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
  Toml,
  Json,
}

impl ConfigFormat {
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_lowercase().as_str() {
      "toml" => Some(Self::Toml),
      "json" => Some(Self::Json),
      _ => None,
    }
  }

  fn extension(&self) -> &'static str {
    match self {
      ConfigFormat::Toml => "toml",
      ConfigFormat::Json => "json",
    }
  }
}

fn parse_str<T: serde::de::DeserializeOwned>(content: &str, format: ConfigFormat) -> FlowResult<T> {
  match format {
    ConfigFormat::Toml => toml::from_str(content).map_err(|e| FlowError::config(format!("TOML parse error: {e}"))),
    ConfigFormat::Json => {
      serde_json::from_str(content).map_err(|e| FlowError::config(format!("JSON parse error: {e}")))
    }
  }
}

pub fn parse_toml(content: &str) -> FlowResult<PipelinesConfig> {
  parse_str(content, ConfigFormat::Toml)
}

pub fn parse_json(content: &str) -> FlowResult<PipelinesConfig> {
  parse_str(content, ConfigFormat::Json)
}

pub fn parse(content: &str, format: ConfigFormat) -> FlowResult<PipelinesConfig> {
  parse_str(content, format)
}

fn format_of(path: &Path) -> FlowResult<ConfigFormat> {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .and_then(ConfigFormat::from_extension)
    .ok_or_else(|| FlowError::config(format!("unsupported config file extension: {}", path.display())))
}

/// Reads a single pipelines file.
pub fn load_file(path: impl AsRef<Path>) -> FlowResult<PipelinesConfig> {
  let path = path.as_ref();
  let format = format_of(path)?;
  let content = std::fs::read_to_string(path)?;
  let config = parse(&content, format)?;
  event!(Level::DEBUG, path = %path.display(), sources = config.sources.len(), "Loaded pipelines file.");
  Ok(config)
}

/// First existing `<dir>/<stem>.toml` or `<dir>/<stem>.json`.
fn find_file(dir: &Path, stem: &str) -> Option<(PathBuf, ConfigFormat)> {
  [ConfigFormat::Toml, ConfigFormat::Json].into_iter().find_map(|format| {
    let candidate = dir.join(format!("{}.{}", stem, format.extension()));
    candidate.is_file().then_some((candidate, format))
  })
}

/// Loads `<config_dir>/agents/pipelines.*` and `<config_dir>/agents/defaults.*`.
///
/// Missing files yield an empty configuration rather than an error. A defaults
/// file, when present, replaces the `[defaults]` table of the pipelines file.
pub fn load_dir(config_dir: impl AsRef<Path>) -> FlowResult<PipelinesConfig> {
  let agents_dir = config_dir.as_ref().join("agents");

  let mut config = match find_file(&agents_dir, PIPELINES_STEM) {
    Some((path, format)) => parse(&std::fs::read_to_string(&path)?, format)?,
    None => {
      event!(Level::WARN, dir = %agents_dir.display(), "No pipelines file found, using an empty configuration.");
      PipelinesConfig::default()
    }
  };

  if let Some((path, format)) = find_file(&agents_dir, DEFAULTS_STEM) {
    let defaults: AgentDefaults = parse_str(&std::fs::read_to_string(&path)?, format)?;
    event!(Level::DEBUG, path = %path.display(), "Loaded agent defaults.");
    config.defaults = defaults;
  }

  event!(Level::INFO, sources = ?config.sources(), "Pipeline configuration loaded.");
  Ok(config)
}

/// `$AGENTFLOW_CONFIG_DIR`, or `./config`.
pub fn config_dir() -> PathBuf {
  std::env::var_os(CONFIG_DIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("config"))
}
