//! Prompts and response schemas for the coaching model.
//!
//! Granularity rules live in the prompt text; the schemas only pin the shape.

use serde_json::{json, Value};

use super::{MAX_STEPS, MICRO_ACTION_COUNT};
use crate::preferences::{EnergyLevel, UserPreferences};

pub const CONTINUE_LABEL: &str = "Continue for 2 minutes";
pub const SKIP_LABEL: &str = "Skip this step";

/// Schema for `{steps: [{step, time}]}`.
pub fn decompose_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "steps": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "step": { "type": "STRING" },
                        "time": { "type": "NUMBER" }
                    },
                    "required": ["step", "time"]
                }
            }
        },
        "required": ["steps"]
    })
}

/// Schema for `{smallerSteps: [3], options: [2], encouragement}`.
pub fn stuck_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "smallerSteps": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": MICRO_ACTION_COUNT,
                "maxItems": MICRO_ACTION_COUNT
            },
            "options": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": 2,
                "maxItems": 2
            },
            "encouragement": { "type": "STRING" }
        },
        "required": ["smallerSteps", "options", "encouragement"]
    })
}

/// Prompt for breaking a (sanitized) task into steps.
pub fn decompose_prompt(task: &str, prefs: &UserPreferences) -> String {
    let prefs_json = serde_json::to_string(prefs).unwrap_or_else(|_| "{}".to_string());
    let energy_rule = match prefs.energy_level {
        EnergyLevel::Low => {
            "- Energy is low: make every action even simpler and smaller than usual."
        }
        EnergyLevel::Medium | EnergyLevel::High => {
            "- Keep every action small enough to start right away."
        }
    };

    format!(
        r#"Task: "{task}"
User Preferences: {prefs_json}

Role: Neuro-inclusive executive function coach.
Goal: Break this task into clear, actionable micro-wins.
Constraints:
- Max {max} steps.
- Exactly one action per step.
- Under 12 words per step.
- "time" is the estimated minutes for the step.
{energy_rule}
- Match the tone to motivationStyle."#,
        task = task.replace('"', "'"),
        prefs_json = prefs_json,
        max = MAX_STEPS,
        energy_rule = energy_rule,
    )
}

/// Prompt for squeezing one step smaller.
pub fn stuck_prompt(step_text: &str) -> String {
    format!(
        r#"The user is overwhelmed by this specific step: "{step}".

Instructions:
1. Break this ONE step into {count} tiny actions that take less than 30 seconds each.
2. Provide two options: "{cont}" and "{skip}".
3. Write one short, warm sentence of encouragement."#,
        step = step_text.replace('"', "'"),
        count = MICRO_ACTION_COUNT,
        cont = CONTINUE_LABEL,
        skip = SKIP_LABEL,
    )
}
