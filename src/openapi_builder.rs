use crate::aggregator::PathAggregator;
use crate::config::{validate_servers, Config, SecurityConfig};
use crate::error::Result;
use crate::observation::{HttpMethod, Observation};
use crate::schema_generator::Schema;
use crate::security::{ConfiguredOAuth2, SecurityRequirement, SecurityScheme, SecuritySchemeSource};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    /// Document-level servers
    servers: Vec<Server>,
    /// Merged paths, built from observations
    aggregator: PathAggregator,
    /// Components section (security schemes)
    security_schemes: IndexMap<String, SecurityScheme>,
    /// Configured ReDoc tag groups
    tag_groups: Vec<TagGroup>,
    /// Group collecting tags no configured group claims
    default_group: String,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// API version
    pub version: String,
    /// ReDoc logo extension
    #[serde(rename = "x-logo", skip_serializing_if = "Option::is_none")]
    pub logo: Option<Logo>,
}

/// ReDoc `x-logo` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// OpenAPI Server object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<IndexMap<String, ServerVariable>>,
}

/// OpenAPI Server Variable object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerVariable {
    pub default: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    /// The operation slot for `method`
    pub fn operation_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }

    /// All present operations, in serialization order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.post,
            &self.put,
            &self.delete,
            &self.patch,
            &self.options,
            &self.head,
        ]
        .into_iter()
        .flatten()
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation summary
    pub summary: String,
    /// Parameters (path, query)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    /// Request body
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses, keyed by status code
    pub responses: IndexMap<String, Response>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    /// Path-local server overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
}

/// Where a parameter is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter location (path, query)
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub name: String,
    /// Whether the parameter is required
    pub required: bool,
    pub schema: Schema,
    /// Parameter description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Content types and their schemas
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
    /// The observed payload this schema was inferred from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response description
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(rename = "securitySchemes")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

/// ReDoc tag group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGroup {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    /// Document-level servers
    pub servers: Vec<Server>,
    /// API paths
    pub paths: IndexMap<String, PathItem>,
    /// Components (security schemes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    /// ReDoc tag groups
    #[serde(rename = "x-tagGroups", skip_serializing_if = "Option::is_none")]
    pub tag_groups: Option<Vec<TagGroup>>,
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info and security settings
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        let defaults = Config::default();
        let default_group = defaults.default_group().to_string();
        Self {
            info: Info {
                title: defaults.info.title,
                description: None,
                version: defaults.info.version,
                logo: None,
            },
            servers: Vec::new(),
            aggregator: PathAggregator::new(SecurityConfig::default()),
            security_schemes: IndexMap::new(),
            tag_groups: Vec::new(),
            default_group,
        }
    }

    /// Create a builder from configuration.
    ///
    /// Fails with every server configuration issue at once when `servers` is malformed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let servers = validate_servers(&config.servers)?;
        let logo = config.info.logo.url.as_ref().map(|url| Logo {
            url: url.clone(),
            background_color: config
                .info
                .logo
                .background_color
                .clone()
                .filter(|color| !color.is_empty()),
            alt_text: config
                .info
                .logo
                .alt_text
                .clone()
                .filter(|text| !text.is_empty()),
        });

        let builder = Self {
            info: Info {
                title: config.info.title.clone(),
                description: config.info.description.clone(),
                version: config.info.version.clone(),
                logo,
            },
            servers,
            aggregator: PathAggregator::new(config.security.clone()),
            security_schemes: IndexMap::new(),
            tag_groups: config.redoc.tag_groups.clone(),
            default_group: config.default_group().to_string(),
        };

        Ok(builder.with_security_schemes(&ConfiguredOAuth2::new(&config.security.oauth2)))
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            description,
            version,
            logo: self.info.logo,
        };
        self
    }

    /// Set document-level servers
    pub fn with_servers(mut self, servers: Vec<Server>) -> Self {
        self.servers = servers;
        self
    }

    /// Adopt the schemes a discovery collaborator found
    pub fn with_security_schemes<S: SecuritySchemeSource>(mut self, source: &S) -> Self {
        self.security_schemes = source.security_schemes();
        self
    }

    /// Configure ReDoc tag groups
    pub fn with_tag_groups(mut self, tag_groups: Vec<TagGroup>, default_group: impl Into<String>) -> Self {
        self.tag_groups = tag_groups;
        self.default_group = default_group.into();
        self
    }

    /// Add an observation to the document; returns `false` when it was skipped
    pub fn add_observation(&mut self, observation: &Observation) -> bool {
        self.aggregator.add(observation)
    }

    /// Add observations in order
    pub fn add_observations<'a, I>(&mut self, observations: I)
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        for observation in observations {
            self.add_observation(observation);
        }
    }

    /// Number of observations skipped so far
    pub fn skipped(&self) -> usize {
        self.aggregator.skipped()
    }

    /// Group every tag used by an operation; unclaimed tags go to a leading default group.
    fn tag_groups(&self, paths: &IndexMap<String, PathItem>) -> Option<Vec<TagGroup>> {
        if self.tag_groups.is_empty() {
            return None;
        }

        let grouped: Vec<&String> = self
            .tag_groups
            .iter()
            .flat_map(|group| group.tags.iter())
            .collect();

        let mut ungrouped: Vec<String> = Vec::new();
        for tag in paths
            .values()
            .flat_map(PathItem::operations)
            .flat_map(|operation| operation.tags.iter())
        {
            if !grouped.contains(&tag) && !ungrouped.contains(tag) {
                ungrouped.push(tag.clone());
            }
        }

        let mut groups = self.tag_groups.clone();
        if !ungrouped.is_empty() {
            debug!("Placing {} ungrouped tags in {}", ungrouped.len(), self.default_group);
            groups.insert(
                0,
                TagGroup {
                    name: self.default_group.clone(),
                    tags: ungrouped,
                },
            );
        }

        Some(groups)
    }

    /// Build the final OpenAPI document
    pub fn build(self) -> OpenApiDocument {
        debug!("Building final OpenAPI document");

        let tag_groups = self.tag_groups(self.aggregator.paths());
        let components = if self.security_schemes.is_empty() {
            None
        } else {
            Some(Components {
                security_schemes: self.security_schemes,
            })
        };

        OpenApiDocument {
            openapi: "3.0.0".to_string(),
            info: self.info,
            servers: self.servers,
            paths: self.aggregator.into_paths(),
            components,
            tag_groups,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}
