//! Observed request evidence.
//!
//! An [`Observation`] is one recorded request shape: the route that served it,
//! the status it answered with and the evidence captured along the way
//! (validation rules, an example response body, route parameter descriptors).
//! Observations are produced by request-handling middleware and consumed by the
//! aggregator as an ordered snapshot.
//!
//! # Example
//!
//! ```
//! use openapi_from_traffic::observation::{HttpMethod, Observation, ObservationStore, RuleCollector};
//!
//! let mut collector = RuleCollector::new();
//! collector.collect("email", ["required", "email"]);
//!
//! let mut observation = Observation::new(HttpMethod::Post, "/users", 201);
//! observation.validation_rules = collector.finish();
//!
//! let mut store = ObservationStore::new(43200);
//! store.record(observation);
//! assert_eq!(store.len(), 1);
//! ```

use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Dotted property path -> ordered rule tokens
pub type PropertyPathMap = IndexMap<String, Vec<String>>;

/// HTTP methods an observation can be recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// HTTP GET method
    #[serde(alias = "GET")]
    Get,
    /// HTTP POST method
    #[serde(alias = "POST")]
    Post,
    /// HTTP PUT method
    #[serde(alias = "PUT")]
    Put,
    /// HTTP PATCH method
    #[serde(alias = "PATCH")]
    Patch,
    /// HTTP DELETE method
    #[serde(alias = "DELETE")]
    Delete,
    /// HTTP OPTIONS method
    #[serde(alias = "OPTIONS")]
    Options,
    /// HTTP HEAD method
    #[serde(alias = "HEAD")]
    Head,
}

impl HttpMethod {
    /// Lowercase name, as used for OpenAPI path item keys
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            "options" => Ok(HttpMethod::Options),
            "head" => Ok(HttpMethod::Head),
            other => Err(Error::InvalidArgument(format!(
                "Unknown HTTP method: {}",
                other
            ))),
        }
    }
}

/// The captured response of an observed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResponseEvidence {
    /// Raw `Content-Type` header, parameters included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// The (obfuscated) body. JSON bodies may be stored decoded or as a raw string.
    #[serde(default)]
    pub body: Value,
}

/// Descriptor of one route parameter, as the router resolved it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteParameter {
    /// Type the parameter is bound to (e.g. `App\Models\User`); `None` for plain strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_type: Option<String>,
    /// Whether the route can not match without this parameter
    #[serde(default = "default_required")]
    pub required: bool,
    /// Query string parameter instead of a path segment
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub in_query: bool,
    /// Validation rules applied to a query parameter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
}

fn default_required() -> bool {
    true
}

impl Default for RouteParameter {
    fn default() -> Self {
        Self {
            bound_type: None,
            required: default_required(),
            in_query: false,
            rules: Vec::new(),
        }
    }
}

/// One recorded request shape together with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Observation {
    pub method: HttpMethod,
    /// Route URI as registered with the router (`users/{user}` or `/users/:user`)
    pub uri: String,
    /// Route name, if the route has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub response_code: u16,
    /// Routing domain the route is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Middleware stack in execution order, with parameters (`auth:api`)
    #[serde(default)]
    pub middleware: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub validation_rules: PropertyPathMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseEvidence>,
    #[serde(default)]
    pub route_parameters: IndexMap<String, RouteParameter>,
    /// Route "where" constraints: parameter name -> regex
    #[serde(default)]
    pub route_wheres: IndexMap<String, String>,
    /// Unix timestamp (seconds) of when the observation was recorded
    #[serde(default)]
    pub recorded_at: u64,
}

/// The identity of an observation. Two observations with the same shape
/// describe the same thing; the newer one supersedes the older.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationShape {
    pub method: HttpMethod,
    pub uri: String,
    pub response_code: u16,
    pub name: Option<String>,
    pub middleware: Vec<String>,
}

impl Observation {
    /// Create an observation without any evidence attached
    pub fn new(method: HttpMethod, uri: impl Into<String>, response_code: u16) -> Self {
        Self {
            method,
            uri: uri.into(),
            name: None,
            response_code,
            domain: None,
            middleware: Vec::new(),
            tags: Vec::new(),
            validation_rules: PropertyPathMap::new(),
            response: None,
            route_parameters: IndexMap::new(),
            route_wheres: IndexMap::new(),
            recorded_at: 0,
        }
    }

    pub fn shape(&self) -> ObservationShape {
        ObservationShape {
            method: self.method,
            uri: self.uri.clone(),
            response_code: self.response_code,
            name: self.name.clone(),
            middleware: self.middleware.clone(),
        }
    }

    /// Tags with duplicates removed, first occurrence kept
    pub fn unique_tags(&self) -> Vec<String> {
        dedup_tags(self.tags.iter().cloned())
    }
}

fn dedup_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

/// Per-request accumulator for validation rules.
///
/// One collector lives for exactly one request and is handed by `&mut` to
/// every validation pass the request goes through.
#[derive(Debug, Default)]
pub struct RuleCollector {
    rules: PropertyPathMap,
}

impl RuleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `tokens` to the rule list of `path`.
    pub fn collect<I, T>(&mut self, path: &str, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.rules
            .entry(path.to_string())
            .or_default()
            .extend(tokens.into_iter().map(Into::into));
    }

    /// Appends every path of one validation pass.
    pub fn collect_all(&mut self, rules: &PropertyPathMap) {
        for (path, tokens) in rules {
            self.collect(path, tokens.iter().cloned());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn finish(self) -> PropertyPathMap {
        self.rules
    }
}

/// In-memory evidence store, iterated in recording order.
#[derive(Debug, Clone)]
pub struct ObservationStore {
    observations: Vec<Observation>,
    /// Seconds an observation stays fresh before it is re-evaluated
    evaluation_delay: u64,
}

impl ObservationStore {
    pub fn new(evaluation_delay: u64) -> Self {
        Self {
            observations: Vec::new(),
            evaluation_delay,
        }
    }

    /// Wrap an existing snapshot, keeping its order
    pub fn from_snapshot(observations: Vec<Observation>, evaluation_delay: u64) -> Self {
        Self {
            observations,
            evaluation_delay,
        }
    }

    /// Load a snapshot from a JSON (`.json`) or YAML file holding an array of observations.
    pub fn from_file(path: &Path, evaluation_delay: u64) -> Result<Self> {
        debug!("Loading observations from {}", path.display());

        let content = fs::read_to_string(path)?;
        let observations: Vec<Observation> = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        debug!("Loaded {} observations", observations.len());
        Ok(Self::from_snapshot(observations, evaluation_delay))
    }

    /// Record an observation, superseding any observation of the same shape.
    ///
    /// The new observation goes to the end of the iteration order. Returns the
    /// observation it replaced.
    pub fn record(&mut self, observation: Observation) -> Option<Observation> {
        let shape = observation.shape();
        let superseded = self
            .observations
            .iter()
            .position(|existing| existing.shape() == shape)
            .map(|index| self.observations.remove(index));

        if superseded.is_some() {
            debug!("Superseding observation {} {}", shape.method, shape.uri);
        }

        self.observations.push(observation);
        superseded
    }

    /// Whether a request of this shape should be observed again at `now`.
    pub fn needs_evaluation(&self, shape: &ObservationShape, now: u64) -> bool {
        match self.find(shape) {
            Some(observation) => {
                now.saturating_sub(observation.recorded_at) >= self.evaluation_delay
            }
            None => true,
        }
    }

    /// Replace the tags of the current observation of this shape.
    ///
    /// Returns `false` when no such observation exists.
    pub fn attach_tags(&mut self, shape: &ObservationShape, tags: Vec<String>) -> bool {
        match self
            .observations
            .iter_mut()
            .find(|observation| observation.shape() == *shape)
        {
            Some(observation) => {
                observation.tags = dedup_tags(tags);
                true
            }
            None => false,
        }
    }

    pub fn find(&self, shape: &ObservationShape) -> Option<&Observation> {
        self.observations
            .iter()
            .find(|observation| observation.shape() == *shape)
    }

    /// The observations in iteration order
    pub fn snapshot(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
