// Intent classification and execution plan synthesis/validation.
//
// The planner has no persistence or execution responsibilities of its own:
// it takes a message or Task, calls a provider, and returns a typed,
// validated result (or a safe fallback) for the orchestrator to act on.

pub mod dag;
pub mod error;
pub mod intent;
pub mod plan;

pub use dag::parallel_groups;
pub use error::{PlannerError, Result};
pub use intent::{classify_intent, IntentAnalysis, IntentType, Urgency};
pub use plan::{fallback_plan, synthesize_plan};
