//! Mapping from generated JSON Schemas to type descriptors

use serde_json::{Map, Value};

use crate::core::types::TypeDescriptor;

/// Describe a schemars root schema (as JSON) with a [`TypeDescriptor`]
///
/// `$ref`s are followed into the root's `definitions`; every step counts
/// against `max_depth`, so self-referential type graphs are rejected instead
/// of recursing forever.
pub fn describe_schema(root: &Value, max_depth: usize) -> Result<TypeDescriptor, String> {
    let empty = Map::new();
    let definitions = root
        .get("definitions")
        .or_else(|| root.get("$defs"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let walker = SchemaWalker {
        definitions,
        max_depth,
    };
    let descriptor = walker.describe(root, None, 1)?;
    descriptor.validate(max_depth)?;
    Ok(descriptor)
}

struct SchemaWalker<'a> {
    definitions: &'a Map<String, Value>,
    max_depth: usize,
}

impl SchemaWalker<'_> {
    fn describe(
        &self,
        node: &Value,
        name_hint: Option<&str>,
        depth: usize,
    ) -> Result<TypeDescriptor, String> {
        if depth > self.max_depth {
            return Err(format!(
                "type nesting exceeds the maximum depth of {}",
                self.max_depth
            ));
        }

        let schema = match node {
            Value::Object(schema) => schema,
            Value::Bool(_) => return Err("schema accepts any value".to_string()),
            _ => return Err("schema is not an object".to_string()),
        };

        let name = schema
            .get("title")
            .and_then(Value::as_str)
            .or(name_hint)
            .unwrap_or("anonymous")
            .to_string();

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            let target = reference
                .rsplit('/')
                .next()
                .ok_or_else(|| format!("malformed reference {}", reference))?;
            let definition = self
                .definitions
                .get(target)
                .ok_or_else(|| format!("unresolved reference {}", reference))?;
            return self.describe(definition, Some(target), depth + 1);
        }

        if let Some(values) = schema.get("enum").and_then(Value::as_array) {
            let members = values
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| format!("enumeration {} has non-string members", name))?;
            return Ok(TypeDescriptor::Enumeration { name, members });
        }

        match schema.get("type") {
            Some(Value::String(kind)) => self.describe_kind(kind, schema, name, depth),
            Some(Value::Array(kinds)) => {
                // Option<T> shows up as ["T", "null"]
                let concrete: Vec<&str> = kinds
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|k| *k != "null")
                    .collect();
                let nullable = concrete.len() < kinds.len();
                match concrete.as_slice() {
                    [kind] => self
                        .describe_kind(kind, schema, name, depth)
                        .map(|descriptor| optional_if(nullable, descriptor)),
                    _ => Err(format!("{} mixes several types", name)),
                }
            }
            Some(_) => Err(format!("{} has a malformed type", name)),
            None => self.describe_union(schema, name, depth),
        }
    }

    fn describe_kind(
        &self,
        kind: &str,
        schema: &Map<String, Value>,
        name: String,
        depth: usize,
    ) -> Result<TypeDescriptor, String> {
        match kind {
            "null" => Ok(TypeDescriptor::Unit),
            "boolean" => Ok(TypeDescriptor::bool()),
            "integer" => Ok(TypeDescriptor::integer()),
            "number" => Ok(TypeDescriptor::float()),
            "string" => Ok(TypeDescriptor::String),
            "array" => match schema.get("items") {
                Some(items @ Value::Object(_)) => Ok(TypeDescriptor::sequence(
                    self.describe(items, None, depth + 1)?,
                )),
                Some(Value::Array(_)) => Err(format!("{} is a tuple", name)),
                _ => Err(format!("{} has no item type", name)),
            },
            "object" => {
                let has_properties = schema
                    .get("properties")
                    .and_then(Value::as_object)
                    .is_some_and(|p| !p.is_empty());
                match schema.get("additionalProperties") {
                    Some(values @ Value::Object(_)) if !has_properties => {
                        Ok(TypeDescriptor::mapping(
                            TypeDescriptor::String,
                            self.describe(values, None, depth + 1)?,
                        ))
                    }
                    _ => Ok(TypeDescriptor::Object { name }),
                }
            }
            other => Err(format!("unknown schema type {}", other)),
        }
    }

    fn describe_union(
        &self,
        schema: &Map<String, Value>,
        name: String,
        depth: usize,
    ) -> Result<TypeDescriptor, String> {
        let branches = ["anyOf", "oneOf", "allOf"]
            .iter()
            .find_map(|key| schema.get(*key).and_then(Value::as_array));
        let Some(branches) = branches else {
            return Err(format!("{} has no concrete type", name));
        };

        let non_null: Vec<&Value> = branches
            .iter()
            .filter(|branch| branch.get("type").and_then(Value::as_str) != Some("null"))
            .collect();
        let nullable = non_null.len() < branches.len();
        match non_null.as_slice() {
            // Option<Struct> is `anyOf: [{$ref}, {type: null}]`
            [single] if nullable || branches.len() == 1 => self
                .describe(single, Some(&name), depth + 1)
                .map(|descriptor| optional_if(nullable, descriptor)),
            _ => Ok(TypeDescriptor::Object { name }),
        }
    }
}

fn optional_if(nullable: bool, descriptor: TypeDescriptor) -> TypeDescriptor {
    match descriptor {
        TypeDescriptor::Optional { .. } => descriptor,
        descriptor if nullable => TypeDescriptor::optional(descriptor),
        descriptor => descriptor,
    }
}
