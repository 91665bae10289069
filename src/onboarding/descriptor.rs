//! # Onboarding Descriptors
//!
//! One YAML descriptor registers one backend service: its network location,
//! its documentation endpoint, and an ordered list of endpoint entries
//! mapping a glob-style path pattern to a per-HTTP-method access
//! declaration. This module owns the raw serde shapes and the normalization
//! into compiled, strongly-typed rules.
//!
//! Access declarations in descriptor files are loosely typed on the wire (a
//! bare flag string, a single group name, or a list); they are normalized
//! exactly once here into the tagged [`AccessPolicy`] variant, so nothing
//! downstream ever re-interprets strings.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::core::error::{GatewayError, GatewayResult};

/// Reserved policy markers, distinguished from literal group names
pub const DENY_ALL_ACCESS_FLAG: &str = "DENY_ALL_ACCESS";
pub const AUTHENTICATE_FLAG: &str = "AUTHENTICATE";
pub const NO_AUTHENTICATION_FLAG: &str = "NO_AUTHENTICATION";

/// Raw descriptor document as it appears on disk
#[derive(Debug, Clone, Deserialize)]
pub struct RawDescriptor {
    #[serde(rename = "api-name")]
    pub api_name: String,
    pub namespace: String,
    pub port: u16,
    pub version: String,
    /// Documentation visibility: "internal" or "external"
    #[serde(rename = "type")]
    pub docs_type: String,
    #[serde(rename = "docs-tag")]
    pub docs_tag: String,
    #[serde(rename = "docs-openapi-endpoint")]
    pub docs_openapi_endpoint: String,
    /// URL prefix the backend declares on its own documented paths,
    /// stripped during aggregation. Defaults to empty.
    #[serde(rename = "path-prefix", default)]
    pub path_prefix: String,
    /// Ordered list of single-key maps: glob pattern -> method -> access
    pub endpoints: Vec<BTreeMap<String, BTreeMap<String, AccessDecl>>>,
}

impl RawDescriptor {
    /// Backend base URL derived from the cluster-internal location
    pub fn base_url(&self) -> String {
        format!(
            "http://{}.{}.svc.cluster.local:{}",
            self.api_name, self.namespace, self.port
        )
    }

    /// Absolute URL of the backend's own OpenAPI document
    pub fn openapi_url(&self) -> String {
        format!("{}{}", self.base_url(), self.docs_openapi_endpoint)
    }

    pub fn is_external(&self) -> bool {
        self.docs_type.eq_ignore_ascii_case("external")
    }
}

/// A per-method access declaration before normalization: a bare string or a
/// list of strings are both accepted
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AccessDecl {
    One(String),
    Many(Vec<String>),
}

impl AccessDecl {
    fn names(&self) -> &[String] {
        match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

/// Normalized access policy for one HTTP method
///
/// The variants are mutually exclusive. When a declaration mixes explicit
/// group names with the `AUTHENTICATE`/`NO_AUTHENTICATION` flags, the
/// explicit names win; `DENY_ALL_ACCESS` wins over everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    DenyAll,
    Authenticated,
    Anonymous,
    /// Caller must belong to at least one of these groups; declaration
    /// order is preserved and duplicates dropped
    Groups(Vec<String>),
}

impl AccessPolicy {
    /// Normalize a raw declaration into the tagged variant
    ///
    /// An empty declaration normalizes to `DenyAll`: an entry that names a
    /// method but grants nothing fails closed.
    pub fn normalize(decl: &AccessDecl) -> Self {
        let names = decl.names();

        if names.iter().any(|n| n == DENY_ALL_ACCESS_FLAG) {
            return Self::DenyAll;
        }

        let mut groups: Vec<String> = Vec::new();
        for name in names {
            if name == AUTHENTICATE_FLAG || name == NO_AUTHENTICATION_FLAG {
                continue;
            }
            if !groups.contains(name) {
                groups.push(name.clone());
            }
        }

        if !groups.is_empty() {
            Self::Groups(groups)
        } else if names.iter().any(|n| n == AUTHENTICATE_FLAG) {
            Self::Authenticated
        } else if names.iter().any(|n| n == NO_AUTHENTICATION_FLAG) {
            Self::Anonymous
        } else {
            warn!("Empty access declaration normalized to DENY_ALL_ACCESS");
            Self::DenyAll
        }
    }
}

/// One compiled endpoint rule: an anchored pattern plus per-method policies
///
/// Order within a service is significant: the first rule whose pattern
/// matches the request path is authoritative.
#[derive(Debug, Clone)]
pub struct EndpointRule {
    /// The glob pattern as written in the descriptor, kept for logging
    pub source: String,
    pattern: Regex,
    policies: BTreeMap<String, AccessPolicy>,
}

impl EndpointRule {
    pub fn compile(
        glob: &str,
        declarations: &BTreeMap<String, AccessDecl>,
    ) -> GatewayResult<Self> {
        let pattern = Regex::new(&translate_glob(glob)).map_err(|e| {
            GatewayError::config(format!("Invalid endpoint pattern '{glob}': {e}"))
        })?;

        let policies = declarations
            .iter()
            .map(|(method, decl)| (method.to_uppercase(), AccessPolicy::normalize(decl)))
            .collect();

        Ok(Self {
            source: glob.to_string(),
            pattern,
            policies,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// The policy configured for an (uppercase) HTTP method, if any
    pub fn policy(&self, method: &str) -> Option<&AccessPolicy> {
        self.policies.get(method)
    }

    /// Methods that carry a configured policy on this rule
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }
}

/// Translate a glob-style pattern into an anchored regular expression
///
/// `*` matches any run of characters including `/`, `?` matches exactly one
/// character, `[seq]` and `[!seq]` are character classes. Everything else is
/// matched literally. The whole pattern is anchored at both ends.
pub fn translate_glob(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("^(?s:");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Scan for the closing bracket; a lone '[' is literal.
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str("\\[");
                } else {
                    let inner: String = chars[i..j].iter().collect();
                    out.push('[');
                    if let Some(rest) = inner.strip_prefix('!') {
                        out.push('^');
                        out.push_str(&rest.replace('\\', "\\\\"));
                    } else {
                        out.push_str(&inner.replace('\\', "\\\\"));
                    }
                    out.push(']');
                    i = j + 1;
                }
            }
            other => {
                if other.is_ascii_alphanumeric() || other == '_' || other == '/' {
                    out.push(other);
                } else {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    out.push_str(")$");
    out
}
