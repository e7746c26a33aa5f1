//! One step, end to end.
//!
//! ```text
//! prior outputs -> context -> template -> plan -> save -> parse -> apply
//! ```
//!
//! Generation and parsing failures abort the step. Everything after a
//! successful generation is best-effort around the saved plan text: a save
//! failure is logged and recorded, and per-action problems end up in the
//! [`ApplyReport`].

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use stepgen_store::{OutputStore, StepId};

use crate::apply::{ApplyEngine, ApplyReport};
use crate::context::{assemble, collect_prior_outputs};
use crate::model::Model;
use crate::plan::{FileAction, GenerationError, PlanParseError, generate_plan, parse_plan};
use crate::template::{TemplateProvider, load_or_placeholder};

/// Inputs for one step run. Nothing is read from ambient configuration.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub step: StepId,
    pub problem_description: Option<String>,
    /// Root of the tree file actions are applied to.
    pub project_root: PathBuf,
    pub apply_enabled: bool,
}

/// Everything a step run produced.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: StepId,
    pub plan_text: String,
    /// Prior steps whose outputs were in the context, oldest first.
    pub context_steps: Vec<StepId>,
    /// Whether the built-in placeholder stood in for the step template.
    pub used_placeholder: bool,
    /// Whether the plan text was persisted as the step's output.
    pub output_saved: bool,
    /// Extracted actions after existence resolution.
    pub actions: Vec<FileAction>,
    pub report: ApplyReport,
}

/// Stage-level failures.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{step}: plan generation failed: {source}")]
    Generation {
        step: StepId,
        #[source]
        source: GenerationError,
    },

    #[error("{step}: plan parsing failed: {source}")]
    Parse {
        step: StepId,
        /// The plan text is still available as the step's output when set.
        output_saved: bool,
        #[source]
        source: PlanParseError,
    },
}

impl StepError {
    pub fn step(&self) -> StepId {
        match self {
            Self::Generation { step, .. } | Self::Parse { step, .. } => *step,
        }
    }
}

/// The collaborators one step run needs.
pub struct StepPipeline<'a> {
    store: &'a dyn OutputStore,
    templates: &'a dyn TemplateProvider,
    model: &'a dyn Model,
    engine: ApplyEngine,
}

impl<'a> StepPipeline<'a> {
    pub fn new(store: &'a dyn OutputStore, templates: &'a dyn TemplateProvider, model: &'a dyn Model) -> Self {
        Self {
            store,
            templates,
            model,
            engine: ApplyEngine::default(),
        }
    }

    pub fn with_engine(mut self, engine: ApplyEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Run `request.step` through every stage.
    pub async fn run(&self, request: &StepRequest) -> Result<StepOutcome, StepError> {
        let step = request.step;
        info!(%step, model = self.model.name(), apply = request.apply_enabled, "generating step");

        let prior = collect_prior_outputs(self.store, step);
        let context = assemble(step, prior, request.problem_description.as_deref());
        let (template, used_placeholder) = load_or_placeholder(self.templates, step);

        let plan_text = generate_plan(self.model, step, &template, &context)
            .await
            .map_err(|source| StepError::Generation { step, source })?;

        let output_saved = match self.store.save_output(step, &plan_text) {
            Ok(()) => true,
            Err(e) => {
                warn!(%step, error = %e, "failed to save step output; continuing");
                false
            }
        };

        let parsed = parse_plan(self.model, &plan_text)
            .await
            .map_err(|source| StepError::Parse {
                step,
                output_saved,
                source,
            })?;

        let root = &request.project_root;
        let actions = self.engine.resolve_existence(&parsed, root);
        let report = self.engine.apply(&parsed, root, request.apply_enabled);

        info!(
            %step,
            actions = actions.len(),
            created = report.created_count(),
            flagged = report.flagged_count(),
            skipped = report.skipped_count(),
            "step complete"
        );

        Ok(StepOutcome {
            step,
            plan_text,
            context_steps: context.steps(),
            used_placeholder,
            output_saved,
            actions,
            report,
        })
    }
}
