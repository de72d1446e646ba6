// Intent classification: turns a raw user message into a structured
// judgement about what kind of response it needs, via a single provider
// call with a strict JSON envelope. Falls back to a safe default task
// classification when the response can't be parsed.

use std::sync::Arc;

use agent_loop::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider};
use serde::{Deserialize, Serialize};

pub const MAX_CLARIFICATION_QUESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Task,
    SimpleQuery,
    ClarificationNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub primary_goal: String,
    #[serde(default)]
    pub suggested_agents: Vec<String>,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
    #[serde(default)]
    pub clarification_questions: Vec<String>,
}

fn default_urgency() -> Urgency {
    Urgency::Normal
}

impl IntentAnalysis {
    /// The envelope returned when a model call can't be parsed: treat the
    /// message as a task over the default research agent rather than fail
    /// the whole pipeline on a formatting hiccup.
    pub fn fallback(message: &str) -> Self {
        Self {
            intent_type: IntentType::Task,
            primary_goal: message.to_string(),
            suggested_agents: vec!["default_research_agent".to_string()],
            urgency: Urgency::Normal,
            clarification_questions: Vec::new(),
        }
    }
}

const SYSTEM_PROMPT: &str = r#"You classify a user message into exactly one of: "task", "simple_query", "clarification_needed".

- Greetings, small talk, and references to prior turns are "simple_query".
- Truly ambiguous requests are "clarification_needed", with up to 5 clarifying questions.
- Anything requiring multiple steps or tools is "task".

Respond with a single JSON object with keys: type, primary_goal, suggested_agents (array of
agent ids), urgency ("low"|"normal"|"high"), clarification_questions (array, only for
clarification_needed). Respond with JSON only, no prose."#;

/// Classify `message` via `provider`, falling back to [`IntentAnalysis::fallback`]
/// on any provider error or unparseable response.
pub async fn classify_intent(provider: Arc<dyn LlmProvider>, message: &str) -> IntentAnalysis {
    let messages = vec![
        LlmMessage {
            role: LlmMessageRole::System,
            content: SYSTEM_PROMPT.to_string(),
            tool_calls: None,
            tool_call_id: None,
        },
        LlmMessage {
            role: LlmMessageRole::User,
            content: message.to_string(),
            tool_calls: None,
            tool_call_id: None,
        },
    ];
    let config = LlmCallConfig {
        model: provider.model_name().to_string(),
        temperature: Some(0.0),
        max_tokens: None,
        tools: Vec::new(),
    };

    let response = match provider.chat_completion(messages, &config).await {
        Ok(response) => response,
        Err(_) => return IntentAnalysis::fallback(message),
    };

    parse_envelope(&response.text).unwrap_or_else(|| IntentAnalysis::fallback(message))
}

fn parse_envelope(text: &str) -> Option<IntentAnalysis> {
    let json_slice = extract_json_object(text)?;
    let mut analysis: IntentAnalysis = serde_json::from_str(json_slice).ok()?;
    analysis.clarification_questions.truncate(MAX_CLARIFICATION_QUESTIONS);
    Some(analysis)
}

/// The simulated provider (and real models, in practice) sometimes wrap JSON
/// in commentary; take the outermost `{...}` span rather than requiring the
/// whole response to be bare JSON.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_loop::SimulatedProvider;

    #[tokio::test]
    async fn unparseable_response_falls_back_to_task() {
        // SimulatedProvider echoes the prompt verbatim, which is not JSON.
        let provider: Arc<dyn LlmProvider> = Arc::new(SimulatedProvider::default());
        let analysis = classify_intent(provider, "hi there").await;
        assert_eq!(analysis.intent_type, IntentType::Task);
        assert_eq!(analysis.primary_goal, "hi there");
        assert_eq!(analysis.suggested_agents, vec!["default_research_agent"]);
    }

    #[test]
    fn parses_embedded_json_object_ignoring_surrounding_prose() {
        let text = r#"here is the result: {"type":"simple_query","primary_goal":"say hi","urgency":"low"} thanks"#;
        let analysis = parse_envelope(text).unwrap();
        assert_eq!(analysis.intent_type, IntentType::SimpleQuery);
        assert_eq!(analysis.urgency, Urgency::Low);
    }

    #[test]
    fn clarification_questions_are_capped_at_five() {
        let text = serde_json::json!({
            "type": "clarification_needed",
            "primary_goal": "unclear",
            "clarification_questions": ["a", "b", "c", "d", "e", "f", "g"],
        })
        .to_string();
        let analysis = parse_envelope(&text).unwrap();
        assert_eq!(analysis.clarification_questions.len(), MAX_CLARIFICATION_QUESTIONS);
    }
}
