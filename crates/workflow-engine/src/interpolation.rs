// `${name}` and `${name.path.into.value}` substitution against a variables
// map. Deliberately string-only: this is not an expression language (see
// `crate::expr` for conditions), it just stringifies whatever the dotted
// path resolves to and splices it into the template.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([a-zA-Z0-9_.]+)\}").unwrap())
}

/// Replace every `${path}` placeholder in `template` with the stringified
/// value found at that dotted path in `variables`. Unresolvable placeholders
/// are left untouched rather than failing the whole template.
pub fn interpolate(template: &str, variables: &HashMap<String, Value>) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &regex::Captures| {
            let path = &caps[1];
            match navigate(path, variables) {
                Some(value) => value_to_string(&value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Same substitution applied recursively to a JSON value's string leaves,
/// used for `body_template`/`action_params`-style structured templates.
pub fn interpolate_value(template: &Value, variables: &HashMap<String, Value>) -> Value {
    match template {
        Value::String(s) => Value::String(interpolate(s, variables)),
        Value::Array(items) => Value::Array(items.iter().map(|item| interpolate_value(item, variables)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Navigate a dotted path through the variables map and any nested
/// objects/arrays it contains (numeric segments index arrays).
pub fn navigate(path: &str, variables: &HashMap<String, Value>) -> Option<Value> {
    let mut segments = path.split('.');
    let root = segments.next()?;
    let mut current = variables.get(root)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn substitutes_a_flat_variable() {
        let variables = vars(&[("name", serde_json::json!("Ada"))]);
        assert_eq!(interpolate("hello ${name}", &variables), "hello Ada");
    }

    #[test]
    fn substitutes_a_dotted_path() {
        let variables = vars(&[("user", serde_json::json!({ "profile": { "city": "Lagos" } }))]);
        assert_eq!(interpolate("lives in ${user.profile.city}", &variables), "lives in Lagos");
    }

    #[test]
    fn leaves_unresolvable_placeholders_untouched() {
        let variables = HashMap::new();
        assert_eq!(interpolate("hi ${ghost}", &variables), "hi ${ghost}");
    }

    #[test]
    fn interpolate_value_recurses_into_nested_structures() {
        let variables = vars(&[("id", serde_json::json!(42))]);
        let template = serde_json::json!({ "path": "/items/${id}", "tags": ["${id}"] });
        let resolved = interpolate_value(&template, &variables);
        assert_eq!(resolved["path"], serde_json::json!("/items/42"));
        assert_eq!(resolved["tags"][0], serde_json::json!("42"));
    }
}
