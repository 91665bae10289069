//! # Onboarding Registry
//!
//! Builds the process-wide routing table and documentation registry from a
//! directory of descriptor files, exactly once before the gateway begins
//! serving. Both structures are immutable after construction and shared via
//! `Arc`, so reads need no synchronization. A descriptor that cannot be read
//! or parsed is retried a bounded number of times and then skipped with a
//! recorded failure; onboarding never aborts startup.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info};

use crate::onboarding::descriptor::{EndpointRule, RawDescriptor};

const READ_ATTEMPTS: u32 = 3;

/// Key identifying one registered backend: (service name, version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub name: String,
    pub version: String,
}

impl ServiceKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// The routes of one (service, version): backend base URL plus the ordered
/// endpoint rules from its descriptor(s)
#[derive(Debug, Clone)]
pub struct ServiceRoutes {
    pub base_url: String,
    pub rules: Vec<EndpointRule>,
}

impl ServiceRoutes {
    /// First rule whose pattern matches the path; declaration order wins
    pub fn matching_rule(&self, path: &str) -> Option<&EndpointRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }
}

/// Mapping from (service, version) to its ordered endpoint rules
///
/// Built once at startup; never mutated afterwards. Hot reload, if ever
/// added, replaces the whole table atomically rather than editing entries.
#[derive(Debug, Default)]
pub struct RoutingTable {
    services: HashMap<ServiceKey, ServiceRoutes>,
}

impl RoutingTable {
    pub fn routes(&self, service: &str, version: &str) -> Option<&ServiceRoutes> {
        self.services
            .get(&ServiceKey::new(service, version))
    }

    /// Routes slot for a (service, version), created with `base_url` when
    /// absent. Rules appended here keep their insertion order.
    pub fn register(
        &mut self,
        key: ServiceKey,
        base_url: impl Into<String>,
    ) -> &mut ServiceRoutes {
        self.services.entry(key).or_insert_with(|| ServiceRoutes {
            base_url: base_url.into(),
            rules: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Documentation metadata for one registered backend
#[derive(Debug, Clone)]
pub struct DocsEntry {
    /// Absolute URL of the backend's own OpenAPI document
    pub openapi_url: String,
    /// Descriptive tag surfaced in the merged documentation
    pub tag: String,
    /// Prefix the backend declares on its documented paths
    pub path_prefix: String,
    /// Whether this entry is part of the external documentation set
    pub external: bool,
}

/// Mapping from (service, version) to its documentation metadata
///
/// Backed by a `BTreeMap` so aggregation iterates services in a stable
/// order, which keeps the merged document deterministic.
#[derive(Debug, Default)]
pub struct DocumentationRegistry {
    entries: BTreeMap<ServiceKey, DocsEntry>,
}

impl DocumentationRegistry {
    pub fn insert(&mut self, key: ServiceKey, entry: DocsEntry) {
        self.entries.insert(key, entry);
    }

    /// All registered entries (the internal documentation set)
    pub fn internal(&self) -> impl Iterator<Item = (&ServiceKey, &DocsEntry)> {
        self.entries.iter()
    }

    /// The subset flagged for external consumption
    pub fn external(&self) -> impl Iterator<Item = (&ServiceKey, &DocsEntry)> {
        self.entries.iter().filter(|(_, entry)| entry.external)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse every descriptor under `dir` and build the two registries
///
/// Files ending in `.yaml`/`.yml` are collected recursively in sorted order
/// so repeated startups see descriptors in the same sequence. Duplicate
/// (service, version) descriptors append their rules after the existing
/// ones.
pub fn build_registries(dir: &Path) -> (RoutingTable, DocumentationRegistry) {
    let mut routing = RoutingTable::default();
    let mut docs = DocumentationRegistry::default();

    let mut files = Vec::new();
    collect_descriptor_files(dir, &mut files);
    files.sort();

    for file in files {
        let Some(raw) = read_descriptor(&file) else {
            continue;
        };

        register(&mut routing, &mut docs, &raw);

        info!(
            process = "onboarding",
            service = %raw.api_name,
            version = %raw.version,
            "Successfully onboarded service"
        );
    }

    (routing, docs)
}

fn collect_descriptor_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!(
                process = "onboarding",
                directory = %dir.display(),
                error = %e,
                "Failed to read descriptor directory"
            );
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_descriptor_files(&path, out);
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
}

/// Read and parse one descriptor with bounded retries
///
/// Returns `None` after the final attempt fails; the caller skips the file.
fn read_descriptor(path: &Path) -> Option<RawDescriptor> {
    for attempt in 1..=READ_ATTEMPTS {
        match try_read(path) {
            Ok(raw) => return Some(raw),
            Err(e) => {
                error!(
                    process = "onboarding",
                    file = %path.display(),
                    attempt,
                    error = %e,
                    "Error reading descriptor, retrying"
                );
            }
        }
    }

    error!(
        process = "onboarding",
        file = %path.display(),
        "Descriptor unreadable after {READ_ATTEMPTS} attempts, skipping"
    );
    None
}

fn try_read(path: &Path) -> Result<RawDescriptor, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut deserializer = serde_yaml::Deserializer::from_str(&content);
    let first = deserializer
        .next()
        .ok_or_else(|| "empty descriptor".to_string())?;
    RawDescriptor::deserialize(first).map_err(|e| e.to_string())
}

fn register(routing: &mut RoutingTable, docs: &mut DocumentationRegistry, raw: &RawDescriptor) {
    let key = ServiceKey::new(&raw.api_name, &raw.version);
    let routes = routing.register(key.clone(), raw.base_url());

    for entry in &raw.endpoints {
        for (glob, declarations) in entry {
            match EndpointRule::compile(glob, declarations) {
                Ok(rule) => routes.rules.push(rule),
                Err(e) => {
                    error!(
                        process = "onboarding",
                        service = %key,
                        pattern = %glob,
                        error = %e,
                        "Skipping endpoint rule with invalid pattern"
                    );
                }
            }
        }
    }

    docs.insert(
        key,
        DocsEntry {
            openapi_url: raw.openapi_url(),
            tag: raw.docs_tag.clone(),
            path_prefix: raw.path_prefix.clone(),
            external: raw.is_external(),
        },
    );
}
