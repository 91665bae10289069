//! Shared fixtures for the integration tests: an in-memory user directory,
//! a test configuration, and programmatic routing-table construction
//! pointed at wiremock backends.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use edge_gateway::auth::credentials::Sha256Verifier;
use edge_gateway::core::config::{
    AuthSettings, DatabaseSettings, DocsSettings, GatewayConfig, LoggingSettings,
    OnboardingSettings, ServerSettings, UpstreamSettings,
};
use edge_gateway::core::context::RequestContext;
use edge_gateway::core::error::GatewayResult;
use edge_gateway::data::directory::UserDirectory;
use edge_gateway::gateway::server::AppState;
use edge_gateway::onboarding::descriptor::{AccessDecl, EndpointRule};
use edge_gateway::onboarding::registry::{
    DocsEntry, DocumentationRegistry, RoutingTable, ServiceKey,
};

/// In-memory user directory: username -> (password hash, groups)
pub struct StubDirectory {
    users: HashMap<String, (String, Vec<String>)>,
}

impl StubDirectory {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
        }
    }

    pub fn with_user(mut self, username: &str, password: &str, groups: &[&str]) -> Self {
        let hash = hex::encode(Sha256::digest(password.as_bytes()));
        self.users.insert(
            username.to_string(),
            (hash, groups.iter().map(|g| g.to_string()).collect()),
        );
        self
    }
}

#[async_trait]
impl UserDirectory for StubDirectory {
    async fn password_hash(
        &self,
        username: &str,
        _ctx: &RequestContext,
    ) -> GatewayResult<Option<String>> {
        Ok(self.users.get(username).map(|(hash, _)| hash.clone()))
    }

    async fn matching_groups(
        &self,
        username: &str,
        groups: &[String],
        _ctx: &RequestContext,
    ) -> GatewayResult<Vec<String>> {
        let mine = self
            .users
            .get(username)
            .map(|(_, groups)| groups.clone())
            .unwrap_or_default();
        Ok(groups.iter().filter(|g| mine.contains(g)).cloned().collect())
    }
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        server: ServerSettings {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            public_url: "http://127.0.0.1:8000/".to_string(),
        },
        auth: AuthSettings {
            token_secret: "integration-test-secret".to_string(),
            token_ttl: Duration::from_secs(600),
        },
        database: DatabaseSettings {
            host: "localhost".to_string(),
            port: 5432,
            user: "user".to_string(),
            password: "password".to_string(),
            name: "auth_db".to_string(),
            min_connections: 1,
            max_connections: 5,
            query_retries: 3,
        },
        onboarding: OnboardingSettings {
            descriptor_dir: "unused".to_string(),
        },
        docs: DocsSettings {
            fetch_timeout: Duration::from_millis(500),
        },
        upstream: UpstreamSettings {
            forward_timeout: Duration::from_millis(500),
        },
        logging: LoggingSettings {
            level: "edge_gateway=debug".to_string(),
            json: false,
        },
    }
}

/// Compile one rule from a glob and (method, access names) pairs
pub fn rule(glob: &str, methods: &[(&str, &[&str])]) -> EndpointRule {
    let declarations: BTreeMap<String, AccessDecl> = methods
        .iter()
        .map(|(method, names)| {
            (
                method.to_string(),
                AccessDecl::Many(names.iter().map(|n| n.to_string()).collect()),
            )
        })
        .collect();
    EndpointRule::compile(glob, &declarations).unwrap()
}

/// A routing table with one service pointing at `base_url`
pub fn routing_for(service: &str, version: &str, base_url: &str, rules: Vec<EndpointRule>) -> RoutingTable {
    let mut routing = RoutingTable::default();
    let routes = routing.register(ServiceKey::new(service, version), base_url);
    routes.rules.extend(rules);
    routing
}

pub fn docs_entry(openapi_url: &str, tag: &str, external: bool) -> DocsEntry {
    DocsEntry {
        openapi_url: openapi_url.to_string(),
        tag: tag.to_string(),
        path_prefix: String::new(),
        external,
    }
}

pub fn app_state(
    routing: RoutingTable,
    docs: DocumentationRegistry,
    directory: StubDirectory,
) -> AppState {
    AppState::new(
        &test_config(),
        routing,
        docs,
        reqwest::Client::new(),
        Arc::new(directory),
        Arc::new(Sha256Verifier),
    )
}
