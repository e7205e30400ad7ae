use crate::error::{Error, Result, ServerConfigIssue};
use crate::openapi_builder::{Server, ServerVariable, TagGroup};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Seconds an observation stays fresh (12 hours)
pub const DEFAULT_EVALUATION_DELAY: u64 = 43_200;

/// Generator configuration. Every section is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub info: InfoConfig,
    /// Raw server entries; validated when the document is assembled
    pub servers: Vec<Value>,
    pub redoc: RedocConfig,
    pub evaluation_delay: u64,
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            info: InfoConfig::default(),
            servers: Vec::new(),
            redoc: RedocConfig::default(),
            evaluation_delay: DEFAULT_EVALUATION_DELAY,
            security: SecurityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct InfoConfig {
    pub title: String,
    pub description: Option<String>,
    pub version: String,
    pub logo: LogoConfig,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            title: "Observed API".to_string(),
            description: None,
            version: "0.0.1".to_string(),
            logo: LogoConfig::default(),
        }
    }
}

/// ReDoc `x-logo` settings; only emitted when `url` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LogoConfig {
    pub url: Option<String>,
    pub background_color: Option<String>,
    pub alt_text: Option<String>,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            url: None,
            background_color: Some("#ffffff".to_string()),
            alt_text: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RedocConfig {
    /// Name of the group collecting ungrouped tags ("Default" when unset)
    pub default_group: Option<String>,
    pub tag_groups: Vec<TagGroup>,
}

/// How middleware names map onto security requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    /// Middleware that authenticate; their parameters name the guards
    pub auth_middleware: Vec<String>,
    /// Middleware whose parameters list required scopes
    pub scope_middleware: Vec<String>,
    /// Guard used when an auth middleware carries no parameters
    pub default_guard: String,
    pub oauth2: Vec<OAuthGuardConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth_middleware: vec!["auth".to_string()],
            scope_middleware: vec!["scopes".to_string(), "scope".to_string()],
            default_guard: "api".to_string(),
            oauth2: Vec::new(),
        }
    }
}

/// An OAuth2 guard and the flows its server has enabled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OAuthGuardConfig {
    pub name: String,
    pub token_url: String,
    #[serde(default)]
    pub authorization_url: Option<String>,
    /// Scope id -> description
    #[serde(default)]
    pub scopes: IndexMap<String, String>,
    #[serde(default)]
    pub flows: Vec<OAuthFlowKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OAuthFlowKind {
    Password,
    ClientCredentials,
    AuthorizationCode,
    Implicit,
}

impl Config {
    /// Load configuration from a JSON (`.json`) or YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());

        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed: std::result::Result<Config, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| Error::ConfigError(format!("{}: {}", path.display(), reason)))
    }

    /// Name of the group that collects tags no configured group claims
    pub fn default_group(&self) -> &str {
        self.redoc.default_group.as_deref().unwrap_or("Default")
    }
}

/// Validate raw server entries, reporting every issue of every entry at once.
pub fn validate_servers(entries: &[Value]) -> Result<Vec<Server>> {
    let mut issues = Vec::new();
    let mut servers = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let before = issues.len();
        let server = validate_server(index, entry, &mut issues);
        if issues.len() == before {
            if let Some(server) = server {
                servers.push(server);
            }
        }
    }

    if !issues.is_empty() {
        return Err(Error::MalformedServers(issues));
    }

    debug!("Validated {} servers", servers.len());
    Ok(servers)
}

fn validate_server(index: usize, entry: &Value, issues: &mut Vec<ServerConfigIssue>) -> Option<Server> {
    let Some(fields) = entry.as_object() else {
        issues.push(ServerConfigIssue::new(index, "The server must be an object."));
        return None;
    };

    let url = match fields.get("url") {
        Some(Value::String(url)) if !url.trim().is_empty() => Some(url.clone()),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            issues.push(ServerConfigIssue::new(index, "The [url] is required."));
            None
        }
        Some(_) => {
            issues.push(ServerConfigIssue::new(index, "The [url] must be a string."));
            None
        }
    };

    let description = match fields.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(description)) => Some(description.clone()),
        Some(_) => {
            issues.push(ServerConfigIssue::new(
                index,
                "The [description] must be a string.",
            ));
            None
        }
    };

    let variables = match fields.get("variables") {
        None | Some(Value::Null) => None,
        Some(Value::Object(variables)) => Some(validate_variables(index, variables, issues)),
        Some(_) => {
            issues.push(ServerConfigIssue::new(
                index,
                "The [variables] must be an object.",
            ));
            None
        }
    };

    Some(Server {
        url: url?,
        description,
        variables: variables.filter(|variables| !variables.is_empty()),
    })
}

fn validate_variables(
    index: usize,
    variables: &Map<String, Value>,
    issues: &mut Vec<ServerConfigIssue>,
) -> IndexMap<String, ServerVariable> {
    let mut validated = IndexMap::new();

    for (name, variable) in variables {
        let Some(fields) = variable.as_object() else {
            issues.push(ServerConfigIssue::new(
                index,
                format!("The variable [{}] must be an object.", name),
            ));
            continue;
        };

        let default = match fields.get("default") {
            Some(Value::String(default)) => Some(default.clone()),
            Some(Value::Number(default)) => Some(default.to_string()),
            _ => {
                issues.push(ServerConfigIssue::new(
                    index,
                    format!("The variable [{}] requires a [default].", name),
                ));
                None
            }
        };

        let values = match fields.get("enum") {
            None | Some(Value::Null) => None,
            Some(Value::Array(values)) => {
                let strings: Option<Vec<String>> = values
                    .iter()
                    .map(|value| value.as_str().map(str::to_string))
                    .collect();
                if strings.is_none() {
                    issues.push(ServerConfigIssue::new(
                        index,
                        format!("The [enum] of variable [{}] must only contain strings.", name),
                    ));
                }
                strings
            }
            Some(_) => {
                issues.push(ServerConfigIssue::new(
                    index,
                    format!("The [enum] of variable [{}] must be a list.", name),
                ));
                None
            }
        };

        let description = match fields.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(description)) => Some(description.clone()),
            Some(_) => {
                issues.push(ServerConfigIssue::new(
                    index,
                    format!("The [description] of variable [{}] must be a string.", name),
                ));
                None
            }
        };

        if let Some(default) = default {
            validated.insert(
                name.clone(),
                ServerVariable {
                    default,
                    values,
                    description,
                },
            );
        }
    }

    validated
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.info.title, "Observed API");
        assert_eq!(config.info.version, "0.0.1");
        assert_eq!(config.info.logo.background_color.as_deref(), Some("#ffffff"));
        assert_eq!(config.evaluation_delay, 43_200);
        assert_eq!(config.security.default_guard, "api");
        assert_eq!(config.default_group(), "Default");
    }

    #[test]
    fn test_load_yaml_with_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
info:
  title: Shop API
  logo:
    url: https://example.com/logo.png
servers:
  - url: https://api.example.com
redoc:
  default-group: Other
  tag-groups:
    - name: Accounts
      tags: [Users]
security:
  oauth2:
    - name: api
      token-url: https://example.com/oauth/token
      flows: [password, client-credentials]
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.info.title, "Shop API");
        assert_eq!(config.info.version, "0.0.1");
        assert_eq!(config.info.logo.background_color.as_deref(), Some("#ffffff"));
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.default_group(), "Other");
        assert_eq!(config.redoc.tag_groups[0].tags, vec!["Users".to_string()]);
        assert_eq!(config.security.auth_middleware, vec!["auth".to_string()]);
        assert_eq!(
            config.security.oauth2[0].flows,
            vec![OAuthFlowKind::Password, OAuthFlowKind::ClientCredentials]
        );
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "evaluation-delay": 60 }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.evaluation_delay, 60);
        assert_eq!(config.info.title, "Observed API");
    }

    #[test]
    fn test_unparsable_config_is_a_config_error() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "evaluation-delay: [not, a, number]\n").unwrap();

        let error = Config::from_file(file.path()).unwrap_err();

        assert!(matches!(error, Error::ConfigError(_)));
        assert!(error.to_string().starts_with("Configuration error: "));
    }

    #[test]
    fn test_valid_servers() {
        let servers = validate_servers(&[
            json!({ "url": "https://api.example.com", "description": null }),
            json!({
                "url": "https://{customerId}.example.com:{port}",
                "description": "Tenant server",
                "variables": {
                    "customerId": { "default": "demo" },
                    "port": { "default": "443", "enum": ["443", "8443"] }
                }
            }),
        ])
        .unwrap();

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].url, "https://api.example.com");
        assert!(servers[0].description.is_none());
        assert!(servers[0].variables.is_none());

        let variables = servers[1].variables.as_ref().unwrap();
        assert_eq!(variables["customerId"].default, "demo");
        assert_eq!(
            variables["port"].values,
            Some(vec!["443".to_string(), "8443".to_string()])
        );
    }

    #[test]
    fn test_every_issue_is_reported() {
        let result = validate_servers(&[
            json!({
                "variables": {
                    "customerId": "demo",
                    "port": 443
                }
            }),
            json!({ "url": "" }),
            json!("https://not-a-map.example.com"),
        ]);

        match result {
            Err(Error::MalformedServers(issues)) => {
                assert_eq!(
                    issues,
                    vec![
                        ServerConfigIssue::new(0, "The [url] is required."),
                        ServerConfigIssue::new(0, "The variable [customerId] must be an object."),
                        ServerConfigIssue::new(0, "The variable [port] must be an object."),
                        ServerConfigIssue::new(1, "The [url] is required."),
                        ServerConfigIssue::new(2, "The server must be an object."),
                    ]
                );
            }
            other => panic!("expected malformed servers, got {:?}", other),
        }
    }

    #[test]
    fn test_variable_without_default() {
        let result = validate_servers(&[json!({
            "url": "https://api.example.com",
            "variables": { "port": { "enum": ["443", 8443] } }
        })]);

        let message = result.unwrap_err().to_string();

        assert!(message.contains("Validation failed with errors for the 1st server"));
        assert!(message.contains("The variable [port] requires a [default]."));
        assert!(message.contains("The [enum] of variable [port] must only contain strings."));
    }
}
