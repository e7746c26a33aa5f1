//! Plan generation: prompt construction and the first model call.
//!
//! The prompt is a deterministic concatenation of the problem description,
//! the prior-step context, the step template and a closing instruction, so
//! the same inputs always produce byte-identical requests.

use thiserror::Error;
use tracing::{debug, info};

use stepgen_store::StepId;

use crate::context::ContextBundle;
use crate::model::Model;

/// Errors from obtaining plan text from the model.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model {model} failed to generate a plan: {source}")]
    Model {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("model {model} returned an empty plan")]
    EmptyResponse { model: String },
}

const PLAN_INSTRUCTION: &str = "\
Based on the context above and the template for this step, produce a concrete, \
actionable file-change plan. For every file, state whether it is created or \
modified, give its path relative to the project root, and include the full \
intended content in a fenced code block.";

/// Build the plan-generation prompt for `step`.
pub fn build_plan_prompt(step: StepId, template: &str, context: &ContextBundle) -> String {
    let mut prompt = String::new();

    if let Some(problem) = context.problem_description() {
        prompt.push_str(&format!("## Problem Description\n\n{problem}\n\n"));
    }

    if !context.entries().is_empty() {
        let completed = context
            .steps()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        prompt.push_str(&format!("## Completed Steps ({completed})\n\n"));
        for entry in context.entries() {
            prompt.push_str(&format!(
                "--- START CONTEXT FROM {step} ---\n{text}\n--- END CONTEXT FROM {step} ---\n\n",
                step = entry.step,
                text = entry.text.trim_end(),
            ));
        }
    }

    prompt.push_str(&format!(
        "## Current Step: {step}\n\n\
         --- TEMPLATE ({step}) ---\n{template}\n--- END TEMPLATE ---\n\n",
        template = template.trim_end(),
    ));

    prompt.push_str(&format!("{PLAN_INSTRUCTION}\n\nGenerate the plan for {step}:"));
    prompt
}

/// Ask the model for `step`'s plan.
///
/// Model errors and blank responses are both failures; there is no retry.
pub async fn generate_plan(
    model: &dyn Model,
    step: StepId,
    template: &str,
    context: &ContextBundle,
) -> Result<String, GenerationError> {
    let prompt = build_plan_prompt(step, template, context);
    debug!(%step, prompt_bytes = prompt.len(), context_steps = context.entries().len(), "requesting plan");

    let text = model
        .complete(&prompt)
        .await
        .map_err(|e| GenerationError::Model {
            model: model.name().to_string(),
            source: e.into(),
        })?;

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse {
            model: model.name().to_string(),
        });
    }

    info!(%step, plan_bytes = text.len(), "plan generated");
    Ok(text)
}
