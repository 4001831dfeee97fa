//! JSON-Schema reference inlining
//!
//! Gemini rejects tool parameter schemas that use local `$ref` pointers. Every reference into the
//! schema's `$defs` (or `definitions`) map is replaced by the definition it points at, and the
//! definition maps themselves are dropped.

use serde_json::{Map, Value};
use tracing::debug;

const REF_KEYS: [&str; 2] = ["$ref", "ref"];
const DEF_PREFIXES: [&str; 2] = ["#/$defs/", "#/definitions/"];

/// Inline every local reference in a tool parameter schema.
///
/// The definitions are taken from the root's `$defs`, falling back to `definitions`. A reference
/// that can't be resolved (unknown name, or a cycle back into a definition being expanded) is
/// left in place.
pub fn resolve_refs(schema: &Value) -> Value {
    let empty = Map::new();
    let defs = schema
        .get("$defs")
        .and_then(Value::as_object)
        .or_else(|| schema.get("definitions").and_then(Value::as_object))
        .unwrap_or(&empty);

    Resolver {
        defs,
        expanding: Vec::new(),
    }
    .resolve(schema)
}

struct Resolver<'a> {
    defs: &'a Map<String, Value>,
    /// Definition names being expanded on the current path
    expanding: Vec<&'a str>,
}

impl<'a> Resolver<'a> {
    fn resolve(&mut self, node: &Value) -> Value {
        match node {
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve(v)).collect()),
            Value::Object(map) => match reference_of(map) {
                Some(reference) => self.resolve_reference(map, reference),
                None => Value::Object(self.copy_stripped(map)),
            },
            other => other.clone(),
        }
    }

    fn resolve_reference(&mut self, node: &Map<String, Value>, reference: &str) -> Value {
        let name = DEF_PREFIXES
            .iter()
            .find_map(|prefix| reference.strip_prefix(prefix))
            .unwrap_or(reference);

        let defs = self.defs;
        let Some((name, definition)) = defs.get_key_value(name) else {
            debug!(reference, "Schema reference has no definition, leaving it in place");
            return self.keep_reference(node);
        };

        if self.expanding.contains(&name.as_str()) {
            debug!(reference, "Cyclic schema reference, leaving it in place");
            return self.keep_reference(node);
        }

        self.expanding.push(name.as_str());
        let mut resolved = self.resolve(definition);
        self.expanding.pop();

        // Annotations on the referencing site win over the definition's
        if let Value::Object(merged) = &mut resolved {
            if let Some(description) = node.get("description").filter(|d| is_truthy(d)) {
                merged.insert("description".to_string(), description.clone());
            }
            if let Some(default) = node.get("default") {
                merged.insert("default".to_string(), default.clone());
            }
        }
        resolved
    }

    /// Copy an unresolvable reference node, keeping its reference keys.
    fn keep_reference(&mut self, node: &Map<String, Value>) -> Value {
        let mut kept = self.copy_stripped(node);
        for key in REF_KEYS {
            if let Some(value) = node.get(key) {
                kept.insert(key.to_string(), value.clone());
            }
        }
        Value::Object(kept)
    }

    fn copy_stripped(&mut self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .filter(|(key, value)| !is_stripped(key, value))
            .map(|(key, value)| (key.clone(), self.resolve(value)))
            .collect()
    }
}

/// The reference target of a node, if it has one.
fn reference_of(map: &Map<String, Value>) -> Option<&str> {
    REF_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .filter(|reference| !reference.is_empty())
}

fn is_stripped(key: &str, value: &Value) -> bool {
    match key {
        "$defs" | "definitions" | "$ref" => true,
        // A property literally named `ref` holds a schema object, not a pointer
        "ref" => value.is_string(),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inlines_defs_reference() {
        let schema = json!({
            "type": "object",
            "properties": {
                "location": {"$ref": "#/$defs/Location"}
            },
            "$defs": {
                "Location": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}}
                }
            }
        });

        assert_eq!(
            resolve_refs(&schema),
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "object",
                        "properties": {"city": {"type": "string"}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_definitions_map_and_bare_ref_key() {
        let schema = json!({
            "type": "object",
            "properties": {
                "unit": {"ref": "#/definitions/Unit"},
                "items": {"type": "array", "items": {"$ref": "#/definitions/Unit"}}
            },
            "definitions": {
                "Unit": {"type": "string", "enum": ["c", "f"]}
            }
        });

        let resolved = resolve_refs(&schema);
        let unit = json!({"type": "string", "enum": ["c", "f"]});
        assert_eq!(resolved["properties"]["unit"], unit);
        assert_eq!(resolved["properties"]["items"]["items"], unit);
        assert!(resolved.get("definitions").is_none());
    }

    #[test]
    fn test_referencing_site_overrides_description_and_default() {
        let schema = json!({
            "properties": {
                "mode": {
                    "$ref": "#/$defs/Mode",
                    "description": "How to run",
                    "default": "fast"
                }
            },
            "$defs": {
                "Mode": {"type": "string", "description": "A mode", "default": "slow"}
            }
        });

        assert_eq!(
            resolve_refs(&schema)["properties"]["mode"],
            json!({"type": "string", "description": "How to run", "default": "fast"})
        );
    }

    #[test]
    fn test_nested_definitions_are_resolved() {
        let schema = json!({
            "properties": {"outer": {"$ref": "#/$defs/Outer"}},
            "$defs": {
                "Outer": {"type": "object", "properties": {"inner": {"$ref": "#/$defs/Inner"}}},
                "Inner": {"type": "integer"}
            }
        });

        assert_eq!(
            resolve_refs(&schema)["properties"]["outer"]["properties"]["inner"],
            json!({"type": "integer"})
        );
    }

    #[test]
    fn test_missing_definition_keeps_reference() {
        let schema = json!({
            "properties": {
                "thing": {"$ref": "#/$defs/Missing", "description": "kept"}
            }
        });

        assert_eq!(
            resolve_refs(&schema)["properties"]["thing"],
            json!({"$ref": "#/$defs/Missing", "description": "kept"})
        );
    }

    #[test]
    fn test_cyclic_reference_terminates() {
        let schema = json!({
            "properties": {"root": {"$ref": "#/$defs/Node"}},
            "$defs": {
                "Node": {
                    "type": "object",
                    "properties": {"next": {"$ref": "#/$defs/Node"}}
                }
            }
        });

        assert_eq!(
            resolve_refs(&schema)["properties"]["root"],
            json!({
                "type": "object",
                "properties": {"next": {"$ref": "#/$defs/Node"}}
            })
        );
    }

    #[test]
    fn test_property_named_ref_survives() {
        let schema = json!({
            "type": "object",
            "properties": {"ref": {"type": "string"}}
        });

        assert_eq!(resolve_refs(&schema), schema);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"$ref": "#/$defs/A", "description": "first"},
                "b": {"anyOf": [{"$ref": "#/$defs/A"}, {"type": "null"}]},
                "c": {"$ref": "#/$defs/Nope"}
            },
            "$defs": {"A": {"type": "number"}}
        });

        let once = resolve_refs(&schema);
        let twice = resolve_refs(&once);
        assert_eq!(once, twice);
    }
}
