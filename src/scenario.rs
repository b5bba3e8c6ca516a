//! Scenarios: declaratively configured responses keyed by method + path
//! pattern, taking priority over the mock store.
//!
//! The registry keeps two indexes for lookup: an exact map for literal
//! patterns and a wildcard list sorted by specificity descending, then by
//! registration order. Both are maintained incrementally on every mutation,
//! under the same readers-writer policy as the store.

use crate::error::MockError;
use crate::pattern::Pattern;
use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A registered scenario: the full response for requests matching its
/// method + path pattern.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub uuid: String,
    pub method: Method,
    pub pattern: Pattern,
    pub status: StatusCode,
    pub content_type: String,
    pub location: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Scenario {
    /// Validate and assemble a scenario. An absent or empty UUID gets a
    /// fresh v4. Method is restricted to the verbs the dispatcher serves;
    /// status must be 100–599.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        uuid: Option<String>,
        method: &str,
        path: &str,
        status_code: u16,
        content_type: String,
        location: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<Scenario, MockError> {
        let method = parse_method(method)?;
        let pattern = Pattern::parse(path)?;
        if !(100..=599).contains(&status_code) {
            return Err(MockError::BadRequest(format!(
                "status code {status_code} out of range 100-599"
            )));
        }
        let status = StatusCode::from_u16(status_code)
            .map_err(|_| MockError::BadRequest(format!("invalid status code {status_code}")))?;
        let uuid = match uuid {
            Some(u) if !u.is_empty() => u,
            _ => Uuid::new_v4().to_string(),
        };
        Ok(Scenario {
            uuid,
            method,
            pattern,
            status,
            content_type,
            location,
            headers,
            body,
        })
    }
}

/// Parse one of the supported request methods.
pub fn parse_method(s: &str) -> Result<Method, MockError> {
    match s.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "HEAD" => Ok(Method::HEAD),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "OPTIONS" => Ok(Method::OPTIONS),
        other => Err(MockError::BadRequest(format!(
            "unsupported method {other:?}"
        ))),
    }
}

/// Split the serialized `"METHOD /path"` form.
pub fn split_request_path(s: &str) -> Result<(&str, &str), MockError> {
    let (method, path) = s
        .trim()
        .split_once(' ')
        .ok_or_else(|| MockError::BadRequest(format!("requestPath {s:?} is not 'METHOD /path'")))?;
    Ok((method.trim(), path.trim()))
}

/// Scenario record on the wire (management API JSON). `requestPath` carries
/// the serialized `"METHOD /path"` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDto {
    #[serde(default)]
    pub uuid: String,
    pub request_path: String,
    pub status_code: u16,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub data: String,
}

impl ScenarioDto {
    pub fn into_scenario(self) -> Result<Scenario, MockError> {
        let (method, path) = split_request_path(&self.request_path)?;
        Scenario::build(
            Some(self.uuid).filter(|u| !u.is_empty()),
            method,
            path,
            self.status_code,
            self.content_type,
            self.location,
            self.headers,
            self.data.into_bytes(),
        )
    }

    pub fn from_scenario(s: &Scenario) -> Self {
        ScenarioDto {
            uuid: s.uuid.clone(),
            request_path: format!("{} {}", s.method, s.pattern.as_str()),
            status_code: s.status.as_u16(),
            content_type: s.content_type.clone(),
            location: s.location.clone(),
            headers: s.headers.clone(),
            data: String::from_utf8_lossy(&s.body).into_owned(),
        }
    }
}

#[derive(Debug)]
struct WildcardEntry {
    uuid: String,
    method: Method,
    pattern: Pattern,
}

#[derive(Debug, Default)]
struct RegistryInner {
    scenarios: HashMap<String, Scenario>,
    exact: HashMap<(Method, String), String>,
    wildcard: Vec<WildcardEntry>,
}

impl RegistryInner {
    fn index(&mut self, s: &Scenario) {
        if s.pattern.is_wildcard() {
            // Insert in sorted position: after all entries of greater or
            // equal specificity, so registration order breaks ties.
            let spec = s.pattern.specificity();
            let pos = self
                .wildcard
                .iter()
                .position(|e| e.pattern.specificity() < spec)
                .unwrap_or(self.wildcard.len());
            self.wildcard.insert(
                pos,
                WildcardEntry {
                    uuid: s.uuid.clone(),
                    method: s.method.clone(),
                    pattern: s.pattern.clone(),
                },
            );
        } else {
            self.exact.insert(
                (s.method.clone(), s.pattern.as_str().to_string()),
                s.uuid.clone(),
            );
        }
    }

    fn deindex(&mut self, s: &Scenario) {
        if s.pattern.is_wildcard() {
            self.wildcard.retain(|e| e.uuid != s.uuid);
        } else {
            self.exact
                .remove(&(s.method.clone(), s.pattern.as_str().to_string()));
        }
    }
}

/// Owns all scenario records and their matcher indexes.
#[derive(Debug, Default)]
pub struct ScenarioRegistry {
    inner: RwLock<RegistryInner>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scenario. Fails with `Conflict` when the UUID is taken.
    pub async fn create(&self, scenario: Scenario) -> Result<Scenario, MockError> {
        let mut g = self.inner.write().await;
        if g.scenarios.contains_key(&scenario.uuid) {
            return Err(MockError::Conflict(format!(
                "scenario {:?} already exists",
                scenario.uuid
            )));
        }
        g.index(&scenario);
        g.scenarios.insert(scenario.uuid.clone(), scenario.clone());
        Ok(scenario)
    }

    pub async fn get(&self, uuid: &str) -> Option<Scenario> {
        self.inner.read().await.scenarios.get(uuid).cloned()
    }

    /// All scenarios, sorted by UUID for stable listings.
    pub async fn list(&self) -> Vec<Scenario> {
        let g = self.inner.read().await;
        let mut all: Vec<Scenario> = g.scenarios.values().cloned().collect();
        all.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        all
    }

    /// Replace the scenario stored under `uuid`. The path UUID wins over any
    /// UUID carried in the body.
    pub async fn update(&self, uuid: &str, mut scenario: Scenario) -> Result<Scenario, MockError> {
        let mut g = self.inner.write().await;
        let old = g.scenarios.get(uuid).cloned().ok_or(MockError::NotFound)?;
        scenario.uuid = uuid.to_string();
        g.deindex(&old);
        g.index(&scenario);
        g.scenarios.insert(uuid.to_string(), scenario.clone());
        Ok(scenario)
    }

    pub async fn delete(&self, uuid: &str) -> Result<(), MockError> {
        let mut g = self.inner.write().await;
        let old = g.scenarios.remove(uuid).ok_or(MockError::NotFound)?;
        g.deindex(&old);
        Ok(())
    }

    /// Highest-priority scenario for a request: exact match first, then the
    /// wildcard list in specificity-then-registration order.
    pub async fn find(&self, method: &Method, path: &str) -> Option<Scenario> {
        let g = self.inner.read().await;
        if let Some(uuid) = g.exact.get(&(method.clone(), path.to_string()))
            && let Some(s) = g.scenarios.get(uuid)
        {
            return Some(s.clone());
        }
        g.wildcard
            .iter()
            .find(|e| e.method == *method && e.pattern.matches(path))
            .and_then(|e| g.scenarios.get(&e.uuid).cloned())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.scenarios.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.scenarios.is_empty()
    }
}
