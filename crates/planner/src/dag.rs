// DAG validation over a plan's steps and their `depends_on` edges — run
// before persisting or executing a plan.
//
// Rules enforced:
// 1. Step IDs must be unique within the plan.
// 2. Every `depends_on` entry must reference a step id present in the plan.
// 3. The dependency graph must be acyclic (topological sort must succeed).

use std::collections::{HashMap, HashSet, VecDeque};

use contracts::PlanStep;

use crate::error::{PlannerError, Result};

/// Validate `steps` and return them in topological order.
pub fn validate(steps: &[PlanStep]) -> Result<Vec<String>> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(PlannerError::DuplicateStepId(step.id.clone()));
        }
    }

    let step_ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    for step in steps {
        for dep in &step.depends_on {
            if !step_ids.contains(dep.as_str()) {
                return Err(PlannerError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    topological_sort(steps)
}

/// Kahn's-algorithm topological sort over the `depends_on` edges (dependency
/// -> dependent). Assumes ids are already known unique and valid.
fn topological_sort(steps: &[PlanStep]) -> Result<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for step in steps {
        adjacency.entry(step.id.as_str()).or_default();
        in_degree.entry(step.id.as_str()).or_insert(0);
    }

    for step in steps {
        for dep in &step.depends_on {
            adjacency.entry(dep.as_str()).or_default().push(step.id.as_str());
            *in_degree.entry(step.id.as_str()).or_insert(0) += 1;
        }
    }

    // Stable: process in plan order among ties, rather than hash order.
    let mut queue: VecDeque<&str> = steps
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(steps.len());

    while let Some(id) = queue.pop_front() {
        sorted.push(id.to_owned());

        if let Some(neighbours) = adjacency.get(id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    if sorted.len() != steps.len() {
        return Err(PlannerError::CycleDetected);
    }

    Ok(sorted)
}

/// Group steps into layers: layer k contains every step whose dependencies
/// all lie in layers `0..k`. Used by the orchestrator to execute a group
/// concurrently while respecting dependency order across groups.
pub fn parallel_groups(steps: &[PlanStep]) -> Result<Vec<Vec<String>>> {
    validate(steps)?;

    let by_id: HashMap<&str, &PlanStep> = steps.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut layer_of: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut remaining: VecDeque<&str> = steps.iter().map(|s| s.id.as_str()).collect();

    while !remaining.is_empty() {
        let mut current_layer = Vec::new();
        let mut next_remaining = VecDeque::new();

        for id in remaining.drain(..) {
            let step = by_id[id];
            let ready = step
                .depends_on
                .iter()
                .all(|dep| layer_of.contains_key(dep.as_str()));
            if ready {
                current_layer.push(id);
            } else {
                next_remaining.push_back(id);
            }
        }

        if current_layer.is_empty() {
            // validate() already proved acyclicity, so this cannot happen.
            return Err(PlannerError::CycleDetected);
        }

        let layer_index = groups.len();
        for id in &current_layer {
            layer_of.insert(id, layer_index);
        }
        groups.push(current_layer.into_iter().map(str::to_owned).collect());
        remaining = next_remaining;
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, depends_on: &[&str]) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            agent_id: "default_research_agent".to_string(),
            action_type: "research".to_string(),
            action_params: serde_json::Value::Null,
            inputs: Vec::new(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            timeout_ms: None,
            max_retries: 0,
            retry_delay_ms: None,
            requires_approval: false,
            approval_prompt: None,
        }
    }

    #[test]
    fn linear_chain_sorts_in_order() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])];
        assert_eq!(validate(&steps).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_places_join_last() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["a"]), step("d", &["b", "c"])];
        let sorted = validate(&steps).unwrap();
        assert_eq!(sorted.first().unwrap(), "a");
        assert_eq!(sorted.last().unwrap(), "d");
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let steps = vec![step("a", &[]), step("a", &[])];
        assert!(matches!(validate(&steps), Err(PlannerError::DuplicateStepId(id)) if id == "a"));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let steps = vec![step("a", &["ghost"])];
        assert!(matches!(
            validate(&steps),
            Err(PlannerError::UnknownDependency { dependency, .. }) if dependency == "ghost"
        ));
    }

    #[test]
    fn cycle_is_detected() {
        let steps = vec![step("a", &["c"]), step("b", &["a"]), step("c", &["b"])];
        assert!(matches!(validate(&steps), Err(PlannerError::CycleDetected)));
    }

    #[test]
    fn diamond_groups_into_three_layers() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["a"]), step("d", &["b", "c"])];
        let groups = parallel_groups(&steps).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0], vec!["a"]);
        assert_eq!(groups[2], vec!["d"]);
        assert_eq!(groups[1].len(), 2);
    }

    #[test]
    fn single_step_is_one_layer() {
        let steps = vec![step("solo", &[])];
        assert_eq!(parallel_groups(&steps).unwrap(), vec![vec!["solo".to_string()]]);
    }
}
