//! The ordered catalog of generation steps.
//!
//! Each step names the template file it reads from `.stepgen/spec/` and the
//! instruction used to customize that template during `stepgen init`.

use serde::Serialize;
use stepgen_store::StepId;

/// One step in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct StepDefinition {
    pub id: StepId,
    /// Template file name inside the spec directory.
    pub template_file: String,
    /// Short human-readable title.
    pub title: String,
    /// Instruction given to the model when customizing the template at init.
    pub init_instruction: String,
}

/// A document customized at init time: every step template plus the
/// auxiliary overall plan.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    pub file_name: String,
    pub instruction: String,
    /// The step this document is the template for, if any.
    pub step: Option<StepId>,
}

/// The overall agent plan document. It is customized at init but is not a
/// generation step of its own.
pub const AGENT_PLAN_FILE: &str = "agent-plan.md";

const AGENT_PLAN_INSTRUCTION: &str = "Write the overall agent plan for the application";

const DEFAULT_STEPS: &[(&str, &str, &str)] = &[
    (
        "step1-problem-definition.md",
        "Problem definition",
        "Generate a detailed problem definition based on the high-level description",
    ),
    (
        "step2-ia-entities.md",
        "Information architecture and entities",
        "Define the information architecture and entities for the application",
    ),
    (
        "step3-data-model.md",
        "Data model",
        "Design the data model, storage tables and access patterns",
    ),
    (
        "step4-generate-ui.md",
        "User interface",
        "Design the UI/UX for the application",
    ),
    (
        "step5-integrate-backend-auth.md",
        "Backend and authentication",
        "Design the backend integration, authentication and authorization",
    ),
    (
        "step6-prepare-deployment.md",
        "Deployment",
        "Prepare the deployment strategy",
    ),
];

/// An ordered list of steps, `step1` first.
#[derive(Debug, Clone, Serialize)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
}

impl StepCatalog {
    /// Build a catalog from `(template_file, title, init_instruction)`
    /// tuples. Step ids are assigned in order starting at `step1`.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let steps = entries
            .into_iter()
            .zip(1u32..)
            .filter_map(|((file, title, instruction), n)| {
                Some(StepDefinition {
                    id: StepId::new(n)?,
                    template_file: file.to_string(),
                    title: title.to_string(),
                    init_instruction: instruction.to_string(),
                })
            })
            .collect();
        Self { steps }
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn get(&self, step: StepId) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == step)
    }

    pub fn contains(&self, step: StepId) -> bool {
        self.get(step).is_some()
    }

    pub fn last(&self) -> Option<StepId> {
        self.steps.last().map(|s| s.id)
    }

    /// The step to generate after `current`: `step1` when nothing has been
    /// generated yet, `None` once the catalog is exhausted.
    pub fn next_after(&self, current: Option<StepId>) -> Option<StepId> {
        let candidate = match current {
            Some(step) => step.next(),
            None => StepId::FIRST,
        };
        self.contains(candidate).then_some(candidate)
    }

    /// Every document `stepgen init` customizes, in catalog order followed by
    /// the agent plan.
    pub fn spec_documents(&self) -> Vec<SpecDocument> {
        let mut docs: Vec<SpecDocument> = self
            .steps
            .iter()
            .map(|s| SpecDocument {
                file_name: s.template_file.clone(),
                instruction: s.init_instruction.clone(),
                step: Some(s.id),
            })
            .collect();
        docs.push(SpecDocument {
            file_name: AGENT_PLAN_FILE.to_string(),
            instruction: AGENT_PLAN_INSTRUCTION.to_string(),
            step: None,
        });
        docs
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::from_entries(DEFAULT_STEPS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: u32) -> StepId {
        StepId::new(n).unwrap()
    }

    #[test]
    fn default_catalog_has_six_ordered_steps() {
        let catalog = StepCatalog::default();
        let ids: Vec<String> = catalog.steps().iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["step1", "step2", "step3", "step4", "step5", "step6"]);
        assert_eq!(
            catalog.get(step(1)).unwrap().template_file,
            "step1-problem-definition.md"
        );
    }

    #[test]
    fn unknown_step_is_not_contained() {
        let catalog = StepCatalog::default();
        assert!(!catalog.contains(step(7)));
        assert!(catalog.get(step(7)).is_none());
    }

    #[test]
    fn next_after_walks_the_catalog() {
        let catalog = StepCatalog::default();
        assert_eq!(catalog.next_after(None), Some(step(1)));
        assert_eq!(catalog.next_after(Some(step(2))), Some(step(3)));
        assert_eq!(catalog.next_after(Some(step(6))), None);
    }

    #[test]
    fn spec_documents_end_with_agent_plan() {
        let docs = StepCatalog::default().spec_documents();
        assert_eq!(docs.len(), 7);
        let last = docs.last().unwrap();
        assert_eq!(last.file_name, AGENT_PLAN_FILE);
        assert!(last.step.is_none());
        assert_eq!(docs[0].step, Some(step(1)));
    }

    #[test]
    fn custom_catalog_assigns_ids_in_order() {
        let catalog = StepCatalog::from_entries([("a.md", "A", "do a"), ("b.md", "B", "do b")]);
        assert_eq!(catalog.last(), Some(step(2)));
        assert_eq!(catalog.get(step(2)).unwrap().title, "B");
    }
}
