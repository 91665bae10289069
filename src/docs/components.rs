//! # Component Graph Operations
//!
//! Reachability pruning and collision renaming over OpenAPI component
//! sections, implemented as explicit passes over owned `serde_json::Value`
//! documents: first a worklist closure over `$ref` edges discovers the set
//! of components reachable from the retained paths, then a rename map is
//! computed against the accumulating merged document and applied in one
//! rewrite pass. Nothing is mutated mid-walk.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

/// Every component section an OpenAPI 3.1 document may carry
pub const COMPONENT_SECTIONS: [&str; 10] = [
    "schemas",
    "responses",
    "parameters",
    "headers",
    "securitySchemes",
    "links",
    "callbacks",
    "pathItems",
    "requestBodies",
    "examples",
];

/// A components object with every section present and empty
pub fn empty_components() -> Value {
    let mut sections = Map::new();
    for section in COMPONENT_SECTIONS {
        sections.insert(section.to_string(), json!({}));
    }
    Value::Object(sections)
}

/// Discard every component not transitively referenced from `doc`'s paths
///
/// Dead-code elimination over the reference graph: a worklist closure
/// starting from the path objects follows each `$ref` into its definition
/// and from there onwards. Cyclic references terminate because a ref is
/// only expanded the first time it is seen.
pub fn prune_unreachable(doc: &mut Value) {
    let mut keep: BTreeSet<String> = BTreeSet::new();
    if let Some(paths) = doc.get("paths") {
        collect_reachable(doc, paths, &mut keep);
    }

    let mut pruned = empty_components();
    if let Some(components) = doc.get("components").and_then(Value::as_object) {
        for reference in &keep {
            let mut segments = reference.split('/').skip(2); // "#", "components"
            let (Some(section), Some(name)) = (segments.next(), segments.next()) else {
                continue;
            };
            if let Some(definition) = components.get(section).and_then(|s| s.get(name)) {
                pruned[section][name] = definition.clone();
            }
        }
    }

    doc["components"] = pruned;
}

fn collect_reachable(doc: &Value, node: &Value, keep: &mut BTreeSet<String>) {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if keep.insert(reference.to_string()) {
                    if let Some(definition) = resolve_pointer(doc, reference) {
                        collect_reachable(doc, definition, keep);
                    }
                }
            } else {
                for value in map.values() {
                    collect_reachable(doc, value, keep);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_reachable(doc, item, keep);
            }
        }
        _ => {}
    }
}

/// Resolve a local `#/...` reference within `doc`
fn resolve_pointer<'a>(doc: &'a Value, reference: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in reference.split('/').skip(1) {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Rename every component in `doc` whose name already exists in `merged`
///
/// The new name is suffixed with the contributing service and version, so
/// two backends can each ship an `Error` schema without clobbering one
/// another. Every `$ref` inside `doc` pointing at a renamed component is
/// rewritten, then the definitions themselves are re-keyed.
pub fn resolve_collisions(doc: &mut Value, merged: &Value, service: &str, version: &str) {
    let renames = collision_renames(doc, merged, service, version);
    if renames.is_empty() {
        return;
    }

    rewrite_refs(doc, &renames);
    rename_definitions(doc, &renames);
}

fn collision_renames(
    doc: &Value,
    merged: &Value,
    service: &str,
    version: &str,
) -> BTreeMap<String, String> {
    let mut renames = BTreeMap::new();

    let Some(components) = doc.get("components").and_then(Value::as_object) else {
        return renames;
    };
    let Some(existing) = merged.get("components").and_then(Value::as_object) else {
        return renames;
    };

    for (section, names) in components {
        let Some(names) = names.as_object() else {
            continue;
        };
        for name in names.keys() {
            let taken = existing
                .get(section)
                .and_then(|s| s.get(name))
                .is_some();
            if taken {
                renames.insert(name.clone(), format!("{name}-{service}-{version}"));
            }
        }
    }

    renames
}

/// Rewrite `$ref` values whose final segment matches a renamed component
fn rewrite_refs(node: &mut Value, renames: &BTreeMap<String, String>) {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get_mut("$ref") {
                if let Some(text) = reference.as_str() {
                    if let Some((prefix, name)) = text.rsplit_once('/') {
                        if let Some(renamed) = renames.get(name) {
                            *reference = Value::String(format!("{prefix}/{renamed}"));
                        }
                    }
                }
            } else {
                for value in map.values_mut() {
                    rewrite_refs(value, renames);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, renames);
            }
        }
        _ => {}
    }
}

fn rename_definitions(doc: &mut Value, renames: &BTreeMap<String, String>) {
    let Some(components) = doc.get_mut("components").and_then(Value::as_object_mut) else {
        return;
    };

    for section in components.values_mut() {
        let Some(section) = section.as_object_mut() else {
            continue;
        };
        let mut renamed = Map::new();
        for (name, definition) in std::mem::take(section) {
            let key = renames.get(&name).cloned().unwrap_or(name);
            renamed.insert(key, definition);
        }
        *section = renamed;
    }
}

/// Merge a collision-free document's paths and components into `target`
pub fn merge_document(target: &mut Value, source: &Value) {
    if let Some(paths) = source.get("paths").and_then(Value::as_object) {
        for (path, item) in paths {
            target["paths"][path] = item.clone();
        }
    }

    if let Some(components) = source.get("components").and_then(Value::as_object) {
        for (section, names) in components {
            let Some(names) = names.as_object() else {
                continue;
            };
            for (name, definition) in names {
                target["components"][section][name] = definition.clone();
            }
        }
    }
}
