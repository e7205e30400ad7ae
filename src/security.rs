//! Security requirements and schemes.
//!
//! Requirements are derived per operation from the middleware stack the
//! request passed through: an authentication middleware names the guards
//! (`auth:api,web`), scope-checking middleware name the scopes
//! (`scopes:orders.read,orders.write`).
//!
//! Schemes describe the guards themselves and are document-wide. They come
//! from a [`SecuritySchemeSource`]; [`ConfiguredOAuth2`] reads them from the
//! `security.oauth2` configuration section.

use crate::config::{OAuthFlowKind, OAuthGuardConfig, SecurityConfig};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Scheme name -> required scopes
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// OpenAPI Security Scheme object (OAuth2 only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub flows: OAuthFlows,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlows {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<OAuthFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_credentials: Option<OAuthFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<OAuthFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit: Option<OAuthFlow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlow {
    pub token_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    pub scopes: IndexMap<String, String>,
}

/// Something that can discover the security schemes of the observed application.
pub trait SecuritySchemeSource {
    /// Scheme name -> scheme. An empty map means no `components` section.
    fn security_schemes(&self) -> IndexMap<String, SecurityScheme>;
}

/// OAuth2 schemes described in configuration.
pub struct ConfiguredOAuth2<'a> {
    guards: &'a [OAuthGuardConfig],
}

impl<'a> ConfiguredOAuth2<'a> {
    pub fn new(guards: &'a [OAuthGuardConfig]) -> Self {
        Self { guards }
    }

    fn scheme(guard: &OAuthGuardConfig) -> SecurityScheme {
        let mut flows = OAuthFlows::default();

        for kind in &guard.flows {
            let needs_authorization = matches!(
                kind,
                OAuthFlowKind::AuthorizationCode | OAuthFlowKind::Implicit
            );
            if needs_authorization && guard.authorization_url.is_none() {
                warn!(
                    "Guard {} enables {:?} without an authorization-url, leaving the flow out",
                    guard.name, kind
                );
                continue;
            }

            let flow = Some(OAuthFlow {
                token_url: guard.token_url.clone(),
                authorization_url: if needs_authorization {
                    guard.authorization_url.clone()
                } else {
                    None
                },
                scopes: guard.scopes.clone(),
            });

            match kind {
                OAuthFlowKind::Password => flows.password = flow,
                OAuthFlowKind::ClientCredentials => flows.client_credentials = flow,
                OAuthFlowKind::AuthorizationCode => flows.authorization_code = flow,
                OAuthFlowKind::Implicit => flows.implicit = flow,
            }
        }

        SecurityScheme {
            scheme_type: "oauth2".to_string(),
            flows,
        }
    }
}

impl SecuritySchemeSource for ConfiguredOAuth2<'_> {
    fn security_schemes(&self) -> IndexMap<String, SecurityScheme> {
        self.guards
            .iter()
            .map(|guard| {
                debug!("Adding OAuth2 scheme for guard {}", guard.name);
                (format!("Guard: {}", guard.name), Self::scheme(guard))
            })
            .collect()
    }
}

/// Splits `name:param1,param2` into the name and its non-empty parameters.
fn parse_middleware(middleware: &str) -> (&str, Vec<String>) {
    match middleware.split_once(':') {
        Some((name, params)) => (
            name.trim(),
            params
                .split(',')
                .map(str::trim)
                .filter(|param| !param.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        None => (middleware.trim(), Vec::new()),
    }
}

/// Derives the security requirements of one operation from its middleware stack.
///
/// Every guard of every authentication middleware yields one requirement
/// (any of them grants access). All scope middleware contribute their scopes
/// to each requirement.
pub fn derive_requirements(middleware: &[String], config: &SecurityConfig) -> Vec<SecurityRequirement> {
    let scopes: Vec<String> = middleware
        .iter()
        .map(|entry| parse_middleware(entry))
        .filter(|(name, _)| config.scope_middleware.iter().any(|scope| scope == name))
        .flat_map(|(_, params)| params)
        .collect();

    middleware
        .iter()
        .map(|entry| parse_middleware(entry))
        .filter(|(name, _)| config.auth_middleware.iter().any(|auth| auth == name))
        .flat_map(|(_, guards)| {
            if guards.is_empty() {
                vec![config.default_guard.clone()]
            } else {
                guards
            }
        })
        .map(|guard| {
            let mut requirement = SecurityRequirement::new();
            requirement.insert(guard, scopes.clone());
            requirement
        })
        .collect()
}
