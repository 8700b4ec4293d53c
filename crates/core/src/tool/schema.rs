//! Checks tool arguments against the JSON Schema subset tool definitions use:
//! `type`, `required`, `properties`, `additionalProperties: false`, `enum`,
//! `const`, `minimum`/`maximum`, `items`, `anyOf`/`oneOf` and local `$ref`s.

use serde_json::{Map, Value};

use super::Error;

// Guards against reference cycles.
const MAX_REF_HOPS: usize = 16;

/// Validates `arguments` against `schema`, collecting every offending field.
pub(crate) fn validate_arguments(
    schema: &Value,
    arguments: &Value,
) -> Result<(), Error> {
    let Value::Object(arguments) = arguments else {
        return Err(Error::validation()
            .with_reason("arguments must be a JSON object")
            .with_field("arguments"));
    };

    let mut checker = Checker::new(schema);
    let root = checker.resolve(schema);
    checker.check_object("", root, arguments);
    checker.into_result()
}

struct Checker<'a> {
    root: &'a Value,
    problems: Vec<(String, String)>,
}

impl<'a> Checker<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            problems: vec![],
        }
    }

    fn into_result(self) -> Result<(), Error> {
        if self.problems.is_empty() {
            return Ok(());
        }
        let reason = self
            .problems
            .iter()
            .map(|(field, problem)| format!("{field}: {problem}"))
            .collect::<Vec<_>>()
            .join("; ");
        let mut err = Error::validation().with_reason(reason);
        let mut seen: Vec<&str> = vec![];
        for (field, _) in &self.problems {
            if !seen.contains(&field.as_str()) {
                seen.push(field);
                err = err.with_field(field.as_str());
            }
        }
        Err(err)
    }

    fn report(&mut self, path: &str, problem: impl Into<String>) {
        self.problems.push((path.to_owned(), problem.into()));
    }

    fn resolve(&self, mut schema: &'a Value) -> &'a Value {
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = schema.get("$ref").and_then(Value::as_str)
            else {
                break;
            };
            let Some(target) = reference
                .strip_prefix('#')
                .and_then(|pointer| self.root.pointer(pointer))
            else {
                warn!("unresolvable schema reference: {reference}");
                break;
            };
            schema = target;
        }
        schema
    }

    fn conforms(&self, schema: &'a Value, value: &Value) -> bool {
        let mut probe = Checker::new(self.root);
        probe.check_value("", schema, value);
        probe.problems.is_empty()
    }

    /// Lists the allowed values when every branch is a constant, the way
    /// documented enums are rendered.
    fn constants(&self, branches: &'a [Value]) -> Option<String> {
        let options = branches
            .iter()
            .map(|branch| self.resolve(branch).get("const").map(Value::to_string))
            .collect::<Option<Vec<_>>>()?;
        Some(options.join(", "))
    }

    fn check_object(
        &mut self,
        path: &str,
        schema: &'a Value,
        object: &Map<String, Value>,
    ) {
        if let Some(required) = schema.get("required").and_then(Value::as_array)
        {
            for key in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(key) {
                    self.report(&join(path, key), "missing required argument");
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
        for (key, value) in object {
            match properties.and_then(|p| p.get(key)) {
                Some(property) => self.check_value(&join(path, key), property, value),
                None if closed => {
                    self.report(&join(path, key), "unexpected argument");
                }
                None => {}
            }
        }
    }

    fn check_value(&mut self, path: &str, schema: &'a Value, value: &Value) {
        let schema = self.resolve(schema);

        let branches = schema
            .get("anyOf")
            .or_else(|| schema.get("oneOf"))
            .and_then(Value::as_array);
        if let Some(branches) = branches {
            if !branches.iter().any(|branch| self.conforms(branch, value)) {
                match self.constants(branches) {
                    Some(options) => {
                        self.report(path, format!("must be one of {options}"))
                    }
                    None => self.report(path, "does not match any allowed shape"),
                }
            }
            return;
        }

        if let Some(ty) = schema.get("type") {
            if !type_matches(ty, value) {
                self.report(
                    path,
                    format!("expected {}, got {}", describe_type(ty), kind_of(value)),
                );
                return;
            }
        }

        if let Some(options) = schema.get("enum").and_then(Value::as_array) {
            if !options.contains(value) {
                let options = options
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                self.report(path, format!("must be one of {options}"));
                return;
            }
        }

        if let Some(expected) = schema.get("const") {
            if expected != value {
                self.report(path, format!("must be {expected}"));
                return;
            }
        }

        if let Some(n) = value.as_f64() {
            let minimum = schema.get("minimum").and_then(Value::as_f64);
            let maximum = schema.get("maximum").and_then(Value::as_f64);
            if minimum.is_some_and(|min| n < min) {
                self.report(path, format!("must be at least {}", schema["minimum"]));
            } else if maximum.is_some_and(|max| n > max) {
                self.report(path, format!("must be at most {}", schema["maximum"]));
            }
        }

        match value {
            Value::Object(object) => self.check_object(path, schema, object),
            Value::Array(items) => {
                if let Some(item_schema) = schema.get("items") {
                    for item in items {
                        self.check_value(path, item_schema, item);
                    }
                }
            }
            _ => {}
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}

fn type_matches(ty: &Value, value: &Value) -> bool {
    match ty {
        Value::String(name) => type_name_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| type_name_matches(name, value)),
        _ => true,
    }
}

fn type_name_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type names are not ours to reject.
        _ => true,
    }
}

fn describe_type(ty: &Value) -> String {
    match ty {
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        Value::String(name) => name.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
