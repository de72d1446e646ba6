// Input resolution for a plan step: starts from `action_params`, then layers
// each declared `StepInput` on top, pulling from a literal value, a previous
// step's output (optionally via a dotted path), or the task's context map.

use std::collections::HashMap;

use contracts::{InputSource, PlanStep, StepInput};
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

/// Resolve every input declared by `step` against `previous_outputs` (keyed
/// by step id) and `context` (the task's context map), merged on top of
/// `action_params`. A step whose referenced dependency was skipped/failed
/// resolves to the input's `default` if present, else fails with
/// `Validation` — it never silently fabricates a value.
pub fn resolve_inputs(
    step: &PlanStep,
    previous_outputs: &HashMap<String, Value>,
    context: &HashMap<String, Value>,
) -> Result<Value> {
    let mut params = step.action_params.clone();
    if params.is_null() {
        params = Value::Object(serde_json::Map::new());
    }
    let object = params
        .as_object_mut()
        .ok_or_else(|| OrchestratorError::Validation("action_params must be an object".to_string()))?;

    for input in &step.inputs {
        let resolved = resolve_one(input, previous_outputs, context)?;
        object.insert(input.name.clone(), resolved);
    }

    Ok(params)
}

fn resolve_one(
    input: &StepInput,
    previous_outputs: &HashMap<String, Value>,
    context: &HashMap<String, Value>,
) -> Result<Value> {
    let found = match &input.source {
        InputSource::Literal { value } => Some(value.clone()),
        InputSource::StepOutput { step_id, path } => previous_outputs
            .get(step_id)
            .and_then(|output| match path {
                Some(path) => navigate(output, path),
                None => Some(output.clone()),
            }),
        InputSource::Context { key } => context.get(key).cloned(),
    };

    match found {
        Some(value) => Ok(value),
        None => match &input.default {
            Some(default) => Ok(default.clone()),
            None if input.required => Err(OrchestratorError::Validation(input.name.clone())),
            None => Ok(Value::Null),
        },
    }
}

/// Navigate a dotted path (`"a.b.c"`) through nested JSON objects/arrays
/// (numeric segments index arrays). Returns `None` on any missing segment.
fn navigate(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.') {
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

    fn input(name: &str, source: InputSource, required: bool, default: Option<Value>) -> StepInput {
        StepInput { name: name.to_string(), source, required, default }
    }

    fn step_with(inputs: Vec<StepInput>) -> PlanStep {
        PlanStep {
            id: "s1".to_string(),
            name: "s1".to_string(),
            description: String::new(),
            agent_id: "default_research_agent".to_string(),
            action_type: "research".to_string(),
            action_params: Value::Null,
            inputs,
            depends_on: Vec::new(),
            timeout_ms: None,
            max_retries: 0,
            retry_delay_ms: None,
            requires_approval: false,
            approval_prompt: None,
        }
    }

    #[test]
    fn literal_input_passes_through() {
        let step = step_with(vec![input(
            "topic",
            InputSource::Literal { value: serde_json::json!("sensors") },
            true,
            None,
        )]);
        let resolved = resolve_inputs(&step, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(resolved["topic"], serde_json::json!("sensors"));
    }

    #[test]
    fn step_output_dotted_path_navigates_nested_value() {
        let mut previous = HashMap::new();
        previous.insert("s0".to_string(), serde_json::json!({ "result": { "count": 3 } }));

        let step = step_with(vec![input(
            "count",
            InputSource::StepOutput { step_id: "s0".to_string(), path: Some("result.count".to_string()) },
            true,
            None,
        )]);
        let resolved = resolve_inputs(&step, &previous, &HashMap::new()).unwrap();
        assert_eq!(resolved["count"], serde_json::json!(3));
    }

    #[test]
    fn missing_required_input_with_no_default_fails_validation() {
        let step = step_with(vec![input(
            "missing",
            InputSource::StepOutput { step_id: "ghost".to_string(), path: None },
            true,
            None,
        )]);
        let err = resolve_inputs(&step, &HashMap::new(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(name) if name == "missing"));
    }

    #[test]
    fn missing_input_falls_back_to_default() {
        let step = step_with(vec![input(
            "missing",
            InputSource::StepOutput { step_id: "ghost".to_string(), path: None },
            true,
            Some(serde_json::json!("fallback")),
        )]);
        let resolved = resolve_inputs(&step, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(resolved["missing"], serde_json::json!("fallback"));
    }

    #[test]
    fn context_input_reads_task_context() {
        let mut context = HashMap::new();
        context.insert("language".to_string(), serde_json::json!("en"));
        let step = step_with(vec![input(
            "language",
            InputSource::Context { key: "language".to_string() },
            true,
            None,
        )]);
        let resolved = resolve_inputs(&step, &HashMap::new(), &context).unwrap();
        assert_eq!(resolved["language"], serde_json::json!("en"));
    }
}
