//! OpenAPI document fragments owned by the gateway itself: the base merged
//! document, the bearer security scheme, the login endpoint served to
//! external consumers, and the placeholder path surfaced for a backend
//! whose documentation could not be fetched.

use serde_json::{json, Value};

use crate::docs::components::empty_components;
use crate::onboarding::registry::ServiceKey;

pub const SECURITY_SCHEME: &str = "HTTPBearer";

/// The base merged document: gateway metadata, empty paths, empty component
/// sections, and the bearer scheme every rewritten operation references
pub fn base_document(public_url: &str) -> Value {
    let mut doc = json!({
        "openapi": "3.1.0",
        "info": {
            "title": "API Gateway",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {},
        "components": empty_components(),
        "servers": [{"url": public_url, "description": "api-gateway"}],
    });

    doc["components"]["securitySchemes"][SECURITY_SCHEME] = json!({
        "type": "http",
        "scheme": "bearer",
        "description": "Bearer token for the API Gateway, needed for authorization",
    });

    doc
}

/// The security requirement attached to every rewritten operation
pub fn bearer_requirement() -> Value {
    json!([{ SECURITY_SCHEME: [] }])
}

/// Seed the gateway's own login endpoint into an external document
pub fn seed_login_endpoint(doc: &mut Value) {
    doc["paths"]["/login"] = json!({
        "post": {
            "tags": ["API-GATEWAY|api-gateway"],
            "summary": "API Gateway Login",
            "description": "Exchange a username and password for a bearer token.",
            "operationId": "login_post",
            "requestBody": {
                "required": true,
                "content": {
                    "application/x-www-form-urlencoded": {
                        "schema": {"$ref": "#/components/schemas/LoginForm"}
                    }
                }
            },
            "responses": {
                "200": {
                    "description": "Successful Response",
                    "content": {"application/json": {"schema": {}}}
                },
                "401": {
                    "description": "Invalid credentials",
                    "content": {
                        "application/json": {
                            "schema": {"$ref": "#/components/schemas/HTTPValidationError"}
                        }
                    }
                }
            }
        }
    });

    doc["components"]["schemas"]["LoginForm"] = json!({
        "title": "LoginForm",
        "type": "object",
        "required": ["username", "password"],
        "properties": {
            "username": {"type": "string", "title": "Username"},
            "password": {"type": "string", "title": "Password", "format": "password"}
        }
    });

    doc["components"]["schemas"]["HTTPValidationError"] = json!({
        "title": "HTTPValidationError",
        "type": "object",
        "properties": {
            "detail": {
                "title": "Detail",
                "type": "array",
                "items": {"$ref": "#/components/schemas/ValidationError"}
            }
        }
    });

    doc["components"]["schemas"]["ValidationError"] = json!({
        "title": "ValidationError",
        "type": "object",
        "required": ["loc", "msg", "type"],
        "properties": {
            "loc": {
                "title": "Location",
                "type": "array",
                "items": {"anyOf": [{"type": "string"}, {"type": "integer"}]}
            },
            "msg": {"type": "string", "title": "Message"},
            "type": {"type": "string", "title": "Error Type"}
        }
    });
}

/// A disabled no-op path surfacing one backend's documentation failure
///
/// The failed service stays visible in the merged document instead of
/// silently disappearing. Returns the re-keyed path and its path item.
pub fn placeholder_path(key: &ServiceKey) -> (String, Value) {
    let display = key.name.to_uppercase();
    let path = format!(
        "/{}/api/{}/documentation-unavailable",
        key.name, key.version
    );
    let operation_id = format!(
        "disabled_{}_{}_documentation_unavailable_get",
        sanitize(&key.name),
        sanitize(&key.version)
    );

    let item = json!({
        "get": {
            "tags": [format!("{display}|{} documentation is down", key.version)],
            "summary": format!("Check {display} - {}'s documentation", key.version),
            "description": format!(
                "This is a disabled path that does nothing. There is something wrong \
                 with {display} - {}'s documentation. Please check {display} - {}'s \
                 documentation endpoint for errors.",
                key.version, key.version
            ),
            "security": bearer_requirement(),
            "deprecated": true,
            "operationId": operation_id,
            "responses": {
                "200": {
                    "description": "Successful Response",
                    "content": {"application/json": {"schema": {}}}
                }
            }
        }
    });

    (path, item)
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
