//! Schema translation and argument validation.
//!
//! Skills declare their input shape as a JSON value (see
//! [`crate::skills::Skill::input_schema`]). This module is the single
//! place that shape is interpreted:
//!
//! - [`to_provider_schema`] projects it into the function-parameter
//!   schema sent to the provider (enum / array / object / primitive,
//!   with an explicit `required` list).
//! - [`validate_args`] checks raw call arguments against it before a
//!   skill ever runs. Validation never coerces: a number where a
//!   string is expected is an error, and unknown fields are rejected.
//!
//! Both functions are total. A schema that cannot be interpreted
//! degrades to "accepts anything" (an empty-object schema) instead of
//! aborting registry construction.

use serde_json::{json, Map, Value};

/// Schema sent to the provider when a skill's declared schema cannot
/// be interpreted.
fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Translates a skill's declared input schema into the provider's
/// function-parameter schema.
///
/// Mapping rules:
/// - `enum` value lists → string type with the enumerated values
/// - arrays → array type with a recursively translated item schema
/// - objects → object type with recursively translated properties and
///   an explicit `required` list
/// - primitives (`string`, `number`, `integer`, `boolean`) map 1:1,
///   carrying `description` and numeric bounds through
/// - anything else → empty-object schema
pub fn to_provider_schema(schema: &Value) -> Value {
    translate(schema).unwrap_or_else(empty_object_schema)
}

fn translate(schema: &Value) -> Option<Value> {
    let obj = schema.as_object()?;

    // Enumerations are string-typed regardless of a declared "type".
    if let Some(values) = obj.get("enum").and_then(Value::as_array) {
        if values.iter().all(Value::is_string) && !values.is_empty() {
            let mut out = Map::new();
            out.insert("type".into(), json!("string"));
            out.insert("enum".into(), Value::Array(values.clone()));
            copy_description(obj, &mut out);
            return Some(Value::Object(out));
        }
        return None;
    }

    match obj.get("type").and_then(Value::as_str)? {
        "string" => Some(primitive("string", obj)),
        "boolean" => Some(primitive("boolean", obj)),
        "number" => Some(numeric("number", obj)),
        "integer" => Some(numeric("integer", obj)),
        "array" => {
            let items = obj
                .get("items")
                .map(to_provider_schema)
                .unwrap_or_else(empty_object_schema);
            let mut out = Map::new();
            out.insert("type".into(), json!("array"));
            out.insert("items".into(), items);
            copy_description(obj, &mut out);
            Some(Value::Object(out))
        }
        "object" => {
            let properties = obj
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            let mut translated = Map::new();
            for (name, prop) in &properties {
                translated.insert(name.clone(), to_provider_schema(prop));
            }

            let mut out = Map::new();
            out.insert("type".into(), json!("object"));
            out.insert("properties".into(), Value::Object(translated));
            out.insert(
                "required".into(),
                Value::Array(
                    required_fields(obj, &properties)
                        .into_iter()
                        .map(Value::String)
                        .collect(),
                ),
            );
            copy_description(obj, &mut out);
            Some(Value::Object(out))
        }
        _ => None,
    }
}

fn primitive(type_name: &str, obj: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!(type_name));
    copy_description(obj, &mut out);
    Value::Object(out)
}

fn numeric(type_name: &str, obj: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!(type_name));
    copy_description(obj, &mut out);
    for bound in ["minimum", "maximum"] {
        if let Some(v) = obj.get(bound) {
            if v.is_number() {
                out.insert(bound.into(), v.clone());
            }
        }
    }
    Value::Object(out)
}

fn copy_description(src: &Map<String, Value>, out: &mut Map<String, Value>) {
    if let Some(desc) = src.get("description") {
        if desc.is_string() {
            out.insert("description".into(), desc.clone());
        }
    }
}

/// The `required` list of an object schema.
///
/// An explicit `required` array wins; otherwise a property is required
/// when it carries no `default` and is not marked `"optional": true`.
fn required_fields(obj: &Map<String, Value>, properties: &Map<String, Value>) -> Vec<String> {
    if let Some(explicit) = obj.get("required").and_then(Value::as_array) {
        return explicit
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
    }

    properties
        .iter()
        .filter(|(_, prop)| {
            let p = prop.as_object();
            let has_default = p.is_some_and(|p| p.contains_key("default"));
            let optional = p
                .and_then(|p| p.get("optional"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            !has_default && !optional
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Validates raw call arguments against a skill's declared schema.
///
/// Returns the list of per-field problems (dotted paths) on failure.
/// A schema that cannot be interpreted accepts anything, mirroring
/// [`to_provider_schema`].
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), Vec<String>> {
    // Uninterpretable schema → the skill accepts anything.
    if translate(schema).is_none() {
        return Ok(());
    }

    let mut problems = Vec::new();
    check(schema, args, "", &mut problems);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

fn check(schema: &Value, value: &Value, path: &str, problems: &mut Vec<String>) {
    let Some(obj) = schema.as_object() else {
        return;
    };

    let label = if path.is_empty() { "arguments" } else { path };

    if let Some(values) = obj.get("enum").and_then(Value::as_array) {
        match value.as_str() {
            Some(s) if values.iter().any(|v| v.as_str() == Some(s)) => {}
            Some(s) => problems.push(format!("{label}: '{s}' is not one of the allowed values")),
            None => problems.push(format!("{label}: expected string, got {}", type_name(value))),
        }
        return;
    }

    match obj.get("type").and_then(Value::as_str) {
        Some("string") => {
            if !value.is_string() {
                problems.push(format!("{label}: expected string, got {}", type_name(value)));
            }
        }
        Some("boolean") => {
            if !value.is_boolean() {
                problems.push(format!("{label}: expected boolean, got {}", type_name(value)));
            }
        }
        Some("integer") => {
            if value.as_i64().is_none() && value.as_u64().is_none() {
                problems.push(format!("{label}: expected integer, got {}", type_name(value)));
            } else {
                check_bounds(obj, value, label, problems);
            }
        }
        Some("number") => {
            if !value.is_number() {
                problems.push(format!("{label}: expected number, got {}", type_name(value)));
            } else {
                check_bounds(obj, value, label, problems);
            }
        }
        Some("array") => match value.as_array() {
            Some(items) => {
                if let Some(item_schema) = obj.get("items") {
                    for (i, item) in items.iter().enumerate() {
                        check(item_schema, item, &format!("{label}[{i}]"), problems);
                    }
                }
            }
            None => problems.push(format!("{label}: expected array, got {}", type_name(value))),
        },
        Some("object") => match value.as_object() {
            Some(fields) => {
                let properties = obj
                    .get("properties")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();

                for name in required_fields(obj, &properties) {
                    if !fields.contains_key(&name) {
                        problems.push(format!("missing required field: {}", join(path, &name)));
                    }
                }

                for (name, field_value) in fields {
                    match properties.get(name) {
                        Some(prop) => check(prop, field_value, &join(path, name), problems),
                        None => problems.push(format!("unknown field: {}", join(path, name))),
                    }
                }
            }
            None => problems.push(format!("{label}: expected object, got {}", type_name(value))),
        },
        _ => {}
    }
}

fn check_bounds(obj: &Map<String, Value>, value: &Value, label: &str, problems: &mut Vec<String>) {
    let Some(n) = value.as_f64() else { return };
    if let Some(min) = obj.get("minimum").and_then(Value::as_f64) {
        if n < min {
            problems.push(format!("{label}: {n} is below minimum {min}"));
        }
    }
    if let Some(max) = obj.get("maximum").and_then(Value::as_f64) {
        if n > max {
            problems.push(format!("{label}: {n} is above maximum {max}"));
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
