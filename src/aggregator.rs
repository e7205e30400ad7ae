//! Observation aggregation.
//!
//! Every observation becomes one [`Operation`]. Operations are merged into a
//! path map keyed by URI, then by method: the first operation seen for a
//! URI + method is kept as a whole, later ones only contribute their
//! responses, and a later response for the same status code replaces the
//! earlier one.

use crate::config::SecurityConfig;
use crate::error::{Error, Result};
use crate::example_inferrer::infer_schema;
use crate::observation::{HttpMethod, Observation, ResponseEvidence, RouteParameter};
use crate::openapi_builder::{
    MediaType, Operation, Parameter, ParameterLocation, PathItem, RequestBody, Response, Server,
};
use crate::schema_generator::{ScalarSchema, Schema, SchemaGenerator, SchemaType};
use crate::security::derive_requirements;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;

const NO_CONTENT: u16 = 204;
const RESPONSE_DESCRIPTION: &str = "Observed response";
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Merges observations into the `paths` map of the document
pub struct PathAggregator {
    security: SecurityConfig,
    paths: IndexMap<String, PathItem>,
    skipped: usize,
}

impl PathAggregator {
    pub fn new(security: SecurityConfig) -> Self {
        Self {
            security,
            paths: IndexMap::new(),
            skipped: 0,
        }
    }

    /// Build the observation's operation and merge it in.
    ///
    /// An observation whose evidence can not be turned into an operation is
    /// skipped with a warning; returns whether it was merged.
    pub fn add(&mut self, observation: &Observation) -> bool {
        match build_operation(observation, &self.security) {
            Ok(operation) => {
                self.merge(normalize_uri(&observation.uri), observation.method, operation);
                true
            }
            Err(e) => {
                warn!(
                    "Skipping observation {} {} ({}): {}",
                    observation.method, observation.uri, observation.response_code, e
                );
                self.skipped += 1;
                false
            }
        }
    }

    /// Merge one operation into the path map
    pub fn merge(&mut self, uri: String, method: HttpMethod, operation: Operation) {
        let slot = self.paths.entry(uri).or_default().operation_mut(method);

        if let Some(existing) = slot.as_mut() {
            debug!("Merging {} responses into {}", operation.responses.len(), existing.summary);
            for (code, response) in operation.responses {
                existing.responses.insert(code, response);
            }
        } else {
            *slot = Some(operation);
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn paths(&self) -> &IndexMap<String, PathItem> {
        &self.paths
    }

    pub fn into_paths(self) -> IndexMap<String, PathItem> {
        self.paths
    }
}

/// Build the OpenAPI operation describing one observation
pub fn build_operation(observation: &Observation, security: &SecurityConfig) -> Result<Operation> {
    debug!("Building operation for {} {}", observation.method, observation.uri);

    let mut responses = IndexMap::new();
    responses.insert(observation.response_code.to_string(), build_response(observation)?);

    let parameters: Vec<Parameter> = observation
        .route_parameters
        .iter()
        .map(|(name, parameter)| build_parameter(name, parameter, observation))
        .collect();

    let request_body = if observation.validation_rules.is_empty() {
        None
    } else {
        let schema = SchemaGenerator::compile_rules(&observation.validation_rules).into_schema();
        let mut content = IndexMap::new();
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema,
                example: None,
            },
        );
        Some(RequestBody { content })
    };

    let servers = observation
        .domain
        .iter()
        .filter(|domain| !domain.is_empty())
        .map(|domain| Server {
            url: domain.clone(),
            description: None,
            variables: None,
        })
        .collect();

    Ok(Operation {
        summary: observation
            .name
            .clone()
            .unwrap_or_else(|| observation.uri.clone()),
        parameters: if parameters.is_empty() {
            None
        } else {
            Some(parameters)
        },
        request_body,
        responses,
        tags: observation.unique_tags(),
        security: derive_requirements(&observation.middleware, security),
        servers,
    })
}

fn build_response(observation: &Observation) -> Result<Response> {
    if observation.response_code == NO_CONTENT {
        return Ok(Response {
            description: RESPONSE_DESCRIPTION.to_string(),
            content: None,
        });
    }

    let evidence = observation.response.as_ref().ok_or_else(|| {
        Error::IncompleteObservation("no response was captured".to_string())
    })?;

    let content_type = media_type(evidence.content_type.as_deref());
    let media = if is_json(&content_type) {
        let body = decode_body(evidence);
        MediaType {
            schema: infer_schema(&body)?,
            example: Some(body),
        }
    } else if content_type.starts_with("text/") {
        MediaType {
            schema: Schema::typed(SchemaType::String),
            example: None,
        }
    } else {
        MediaType {
            schema: Schema::Scalar(ScalarSchema::default()),
            example: None,
        }
    };

    let mut content = IndexMap::new();
    content.insert(content_type, media);

    Ok(Response {
        description: RESPONSE_DESCRIPTION.to_string(),
        content: Some(content),
    })
}

/// JSON bodies may have been stored as the raw response text; a string that
/// does not parse is itself the decoded value.
fn decode_body(evidence: &ResponseEvidence) -> Value {
    match &evidence.body {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            debug!("Keeping string response body as is: {}", e);
            evidence.body.clone()
        }),
        body => body.clone(),
    }
}

fn build_parameter(name: &str, parameter: &RouteParameter, observation: &Observation) -> Parameter {
    if parameter.in_query {
        return Parameter {
            location: ParameterLocation::Query,
            name: name.to_string(),
            required: parameter.required,
            schema: SchemaGenerator::compile_leaf(&parameter.rules),
            description: None,
        };
    }

    Parameter {
        location: ParameterLocation::Path,
        name: name.to_string(),
        required: parameter.required,
        schema: Schema::Scalar(ScalarSchema {
            schema_type: Some(SchemaType::String),
            format: observation.route_wheres.get(name).cloned(),
            ..Default::default()
        }),
        description: Some(describe_parameter(name, parameter.bound_type.as_deref())),
    }
}

/// The `type/subtype` part of a `Content-Type` header
pub fn media_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|header| header.split(';').next())
        .map(str::trim)
        .filter(|media| !media.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Humanized parameter description: the bound type's short name, or the
/// StudlyCase parameter name for plain strings.
pub fn describe_parameter(name: &str, bound_type: Option<&str>) -> String {
    match bound_type {
        Some(bound) if !bound.is_empty() && bound != "string" => bound
            .rsplit(|c: char| c == '\\' || c == ':')
            .find(|segment| !segment.is_empty())
            .unwrap_or(bound)
            .to_string(),
        _ => studly_case(name),
    }
}

fn studly_case(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Convert a route URI to OpenAPI form: leading `/`, `:param` -> `{param}`
pub fn normalize_uri(uri: &str) -> String {
    let converted: Vec<String> = uri
        .trim_start_matches('/')
        .split('/')
        .map(|part| match part.strip_prefix(':') {
            Some(param) => format!("{{{}}}", param),
            None => part.to_string(),
        })
        .collect();

    format!("/{}", converted.join("/"))
}
