// Applies a `transform` node's ordered `TransformOp` list against the
// execution's variables map, writing each operation's result into its
// declared `output` key so later operations (or later nodes) can read it.

use std::collections::HashMap;

use contracts::TransformOp;
use serde_json::Value;

use crate::error::{Result, WorkflowEngineError};
use crate::expr;
use crate::interpolation::{interpolate, navigate};

pub fn apply(operations: &[TransformOp], variables: &mut HashMap<String, Value>) -> Result<()> {
    for op in operations {
        apply_one(op, variables)?;
    }
    Ok(())
}

fn apply_one(op: &TransformOp, variables: &mut HashMap<String, Value>) -> Result<()> {
    match op {
        TransformOp::Map { input, expression, output } => {
            let items = array_input(input, variables)?;
            let mut mapped = Vec::with_capacity(items.len());
            for item in items {
                let mut scope = variables.clone();
                scope.insert("item".to_string(), item);
                mapped.push(expr::evaluate(expression, &scope)?);
            }
            variables.insert(output.clone(), Value::Array(mapped));
        }
        TransformOp::Filter { input, expression, output } => {
            let items = array_input(input, variables)?;
            let mut kept = Vec::new();
            for item in items {
                let mut scope = variables.clone();
                scope.insert("item".to_string(), item.clone());
                if expr::evaluate_bool(expression, &scope)? {
                    kept.push(item);
                }
            }
            variables.insert(output.clone(), Value::Array(kept));
        }
        TransformOp::Reduce { input, initial, expression, output } => {
            let items = array_input(input, variables)?;
            let mut acc = initial.clone();
            for item in items {
                let mut scope = variables.clone();
                scope.insert("acc".to_string(), acc);
                scope.insert("item".to_string(), item);
                acc = expr::evaluate(expression, &scope)?;
            }
            variables.insert(output.clone(), acc);
        }
        TransformOp::Extract { input, path, output } => {
            let value = navigate(&format!("{input}.{path}"), variables).unwrap_or(Value::Null);
            variables.insert(output.clone(), value);
        }
        TransformOp::Format { template, output } => {
            variables.insert(output.clone(), Value::String(interpolate(template, variables)));
        }
        TransformOp::Merge { inputs, output } => {
            let mut merged = serde_json::Map::new();
            for name in inputs {
                if let Some(Value::Object(map)) = variables.get(name) {
                    merged.extend(map.clone());
                } else if let Some(value) = variables.get(name) {
                    merged.insert(name.clone(), value.clone());
                }
            }
            variables.insert(output.clone(), Value::Object(merged));
        }
    }
    Ok(())
}

fn array_input(name: &str, variables: &HashMap<String, Value>) -> Result<Vec<Value>> {
    match variables.get(name) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(WorkflowEngineError::InvalidExpression(
            name.to_string(),
            format!("expected an array, found {other}"),
        )),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_doubles_each_element() {
        let mut variables = HashMap::new();
        variables.insert("nums".to_string(), serde_json::json!([1, 2, 3]));
        let ops = vec![TransformOp::Map {
            input: "nums".to_string(),
            expression: "item".to_string(),
            output: "copy".to_string(),
        }];
        apply(&ops, &mut variables).unwrap();
        assert_eq!(variables["copy"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn filter_keeps_matching_elements() {
        let mut variables = HashMap::new();
        variables.insert("nums".to_string(), serde_json::json!([1, 2, 3, 4]));
        let ops = vec![TransformOp::Filter {
            input: "nums".to_string(),
            expression: "item > 2".to_string(),
            output: "big".to_string(),
        }];
        apply(&ops, &mut variables).unwrap();
        assert_eq!(variables["big"], serde_json::json!([3, 4]));
    }

    #[test]
    fn reduce_carries_the_accumulator_across_iterations() {
        // The evaluator has no arithmetic operators (equality/comparison/
        // boolean/length/membership only), so a reduce expression can only
        // select between `acc` and `item`; this exercises that the
        // accumulator is threaded correctly rather than arithmetic
        // semantics, which are out of scope for the minimal language.
        let mut variables = HashMap::new();
        variables.insert("nums".to_string(), serde_json::json!([1, 2, 3]));
        let ops = vec![TransformOp::Reduce {
            input: "nums".to_string(),
            initial: serde_json::json!(0),
            expression: "item".to_string(),
            output: "last".to_string(),
        }];
        apply(&ops, &mut variables).unwrap();
        assert_eq!(variables["last"], serde_json::json!(3));
    }

    #[test]
    fn extract_navigates_a_dotted_path() {
        let mut variables = HashMap::new();
        variables.insert("user".to_string(), serde_json::json!({ "profile": { "city": "Lagos" } }));
        let ops = vec![TransformOp::Extract {
            input: "user".to_string(),
            path: "profile.city".to_string(),
            output: "city".to_string(),
        }];
        apply(&ops, &mut variables).unwrap();
        assert_eq!(variables["city"], serde_json::json!("Lagos"));
    }

    #[test]
    fn format_interpolates_a_template() {
        let mut variables = HashMap::new();
        variables.insert("name".to_string(), serde_json::json!("Ada"));
        let ops = vec![TransformOp::Format { template: "hello ${name}".to_string(), output: "greeting".to_string() }];
        apply(&ops, &mut variables).unwrap();
        assert_eq!(variables["greeting"], serde_json::json!("hello Ada"));
    }

    #[test]
    fn merge_combines_object_inputs() {
        let mut variables = HashMap::new();
        variables.insert("a".to_string(), serde_json::json!({ "x": 1 }));
        variables.insert("b".to_string(), serde_json::json!({ "y": 2 }));
        let ops = vec![TransformOp::Merge { inputs: vec!["a".to_string(), "b".to_string()], output: "merged".to_string() }];
        apply(&ops, &mut variables).unwrap();
        assert_eq!(variables["merged"], serde_json::json!({ "x": 1, "y": 2 }));
    }
}
