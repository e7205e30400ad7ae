//! OpenAPI from traffic - OpenAPI documentation compiled from observed HTTP traffic.
//!
//! Request-handling middleware records *observations*: for each distinct
//! (method, URI, status) it captures the validation rules the request went
//! through and an example of the response body. This library turns a
//! snapshot of those observations into one OpenAPI 3.0 document.
//!
//! # Architecture
//!
//! 1. [`observation`] - Observation model, per-request rule collection and the evidence store
//! 2. [`rules`] - Vocabulary of validation rule tokens (types, nullability, bounds, formats)
//! 3. [`schema_generator`] - Schema types and the dotted-path rule compiler
//! 4. [`example_inferrer`] - Schemas inferred from example payloads
//! 5. [`security`] - Security requirements from middleware, OAuth2 schemes
//! 6. [`aggregator`] - Builds one operation per observation and merges them into paths
//! 7. [`openapi_builder`] - Document types and the final document assembly
//! 8. [`config`] - Configuration file model and server validation
//! 9. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```
//! use openapi_from_traffic::{
//!     observation::{HttpMethod, Observation, ResponseEvidence, RuleCollector},
//!     openapi_builder::OpenApiBuilder,
//!     serializer::serialize_yaml,
//! };
//! use serde_json::json;
//!
//! // Collected while the request was validated
//! let mut rules = RuleCollector::new();
//! rules.collect("email", ["required", "email"]);
//! rules.collect("name", ["nullable", "string", "max:255"]);
//!
//! let mut observation = Observation::new(HttpMethod::Post, "users", 201);
//! observation.validation_rules = rules.finish();
//! observation.response = Some(ResponseEvidence {
//!     content_type: Some("application/json".to_string()),
//!     body: json!({ "id": 1, "email": "jane@example.com" }),
//! });
//!
//! let mut builder = OpenApiBuilder::new();
//! builder.add_observation(&observation);
//! let document = builder.build();
//!
//! assert!(document.paths["/users"].post.is_some());
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod error;
pub mod example_inferrer;
pub mod observation;
pub mod openapi_builder;
pub mod rules;
pub mod schema_generator;
pub mod security;
pub mod serializer;
