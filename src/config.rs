//! Unified YAML configuration: sections plus pre-registered scenarios.
//!
//! Loaded once at startup and immutable afterwards. Unknown keys are
//! ignored for forward compatibility; both `sections` and `scenarios` are
//! optional, and an empty config is a valid server that 404s everything
//! outside the management surface.

use crate::dispatch::AppState;
use crate::error::MockError;
use crate::fixture::FixtureLoader;
use crate::pattern::Pattern;
use crate::scenario::{Scenario, ScenarioRegistry, split_request_path};
use crate::section::{Section, SectionRouter};
use crate::store::MockStore;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Root config (unimock.yaml).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sections: HashMap<String, SectionConfig>,

    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
}

/// One entry under `sections:`.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionConfig {
    pub path_pattern: String,

    /// JSON-pointer (or XML element path) expressions run against POST/PATCH bodies.
    #[serde(default)]
    pub body_id_paths: Vec<String>,

    /// Header names read as IDs when present.
    #[serde(default)]
    pub header_id_names: Vec<String>,

    /// When true, POST echoes the stored body in the 201 response.
    #[serde(default)]
    pub return_body: bool,
}

/// One entry under `scenarios:`. Accepts either `method` + `path` fields or
/// the serialized `requestPath: "METHOD /path"` form the management API uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub uuid: Option<String>,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default, rename = "requestPath")]
    pub request_path: Option<String>,

    pub status_code: u16,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// Response body; may carry fixture directives (`@p`, `< p`, `<@ p`).
    #[serde(default)]
    pub data: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&s).context("parse config YAML")?;
        Ok(config)
    }
}

/// Build the runtime state: sections into the router, scenarios (with
/// fixture expansion relative to `config_dir`) into the registry, and a
/// fresh empty mock store.
pub async fn build_state(config: &Config, config_dir: &Path) -> anyhow::Result<AppState> {
    let mut sections = Vec::with_capacity(config.sections.len());
    for (name, sc) in &config.sections {
        let pattern = Pattern::parse(&sc.path_pattern)
            .map_err(|e| anyhow::anyhow!("section {name:?}: {e}"))?;
        sections.push(Section {
            name: name.clone(),
            pattern,
            body_id_paths: sc.body_id_paths.clone(),
            header_id_names: sc.header_id_names.clone(),
            return_body: sc.return_body,
        });
    }

    let registry = ScenarioRegistry::new();
    let mut fixtures = FixtureLoader::new(config_dir);
    for (i, sc) in config.scenarios.iter().enumerate() {
        let scenario = build_scenario(sc, &mut fixtures)
            .map_err(|e| anyhow::anyhow!("scenario #{}: {e}", i + 1))?;
        registry
            .create(scenario)
            .await
            .map_err(|e| anyhow::anyhow!("scenario #{}: {e}", i + 1))?;
    }

    tracing::info!(
        sections = sections.len(),
        scenarios = registry.len().await,
        "configuration loaded"
    );
    Ok(AppState {
        scenarios: Arc::new(registry),
        store: Arc::new(MockStore::new()),
        sections: Arc::new(SectionRouter::new(sections)),
    })
}

fn build_scenario(
    sc: &ScenarioConfig,
    fixtures: &mut FixtureLoader,
) -> Result<Scenario, MockError> {
    let (method, path) = match (&sc.request_path, &sc.method, &sc.path) {
        (Some(rp), _, _) => {
            let (m, p) = split_request_path(rp)?;
            (m.to_string(), p.to_string())
        }
        (None, Some(m), Some(p)) => (m.clone(), p.clone()),
        _ => {
            return Err(MockError::BadRequest(
                "scenario needs either method + path or requestPath".to_string(),
            ));
        }
    };
    let body = sc
        .data
        .as_deref()
        .map(|d| fixtures.expand(d))
        .unwrap_or_default();
    Scenario::build(
        sc.uuid.clone(),
        &method,
        &path,
        sc.status_code,
        sc.content_type.clone().unwrap_or_default(),
        sc.location.clone().unwrap_or_default(),
        sc.headers.clone().unwrap_or_default(),
        body,
    )
}
