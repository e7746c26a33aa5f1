//! `stepgen generate`: run one step through the pipeline and report.

use anyhow::{Context, Result, bail};

use stepgen_core::apply::ApplyReport;
use stepgen_core::pipeline::{StepError, StepOutcome, StepPipeline, StepRequest};
use stepgen_core::steps::StepCatalog;
use stepgen_core::template::DirTemplateProvider;
use stepgen_core::{ProjectLayout, StepId};

use crate::config::{self, CliOverrides};

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    pub apply: bool,
    pub show_plan: bool,
    pub show_content: bool,
}

/// Pick the step to run: the requested one, or the one after
/// `current_step`.
pub fn select_step(catalog: &StepCatalog, requested: Option<StepId>, current: Option<StepId>) -> Result<StepId> {
    match requested {
        Some(step) if catalog.contains(step) => Ok(step),
        Some(step) => bail!(
            "unknown step {step} (this project has step1 through {})",
            catalog.last().map(|s| s.to_string()).unwrap_or_default()
        ),
        None => match catalog.next_after(current) {
            Some(step) => Ok(step),
            None => bail!("every step has been generated; pass a step to regenerate one"),
        },
    }
}

pub async fn run_generate(
    layout: &ProjectLayout,
    requested: Option<StepId>,
    options: GenerateOptions,
    overrides: &CliOverrides,
) -> Result<()> {
    let project = config::load_config(layout)?;
    let catalog = StepCatalog::default();
    let step = select_step(&catalog, requested, project.current_step)?;

    let user = config::load_user_config();
    let spec = config::resolve_model_spec(
        project.model.as_ref(),
        user.as_ref().and_then(|u| u.model.as_ref()),
        overrides,
    );
    let model = spec.build().context("invalid model configuration")?;

    let store = layout.output_store();
    let templates = DirTemplateProvider::new(layout.spec_dir(), catalog);
    let request = StepRequest {
        step,
        problem_description: Some(project.problem_description.clone()),
        project_root: layout.root().to_path_buf(),
        apply_enabled: options.apply,
    };

    println!("Generating {step} with {}...", spec.provider);
    let outcome = match StepPipeline::new(&store, &templates, &model).run(&request).await {
        Ok(outcome) => outcome,
        Err(e @ StepError::Parse { output_saved, .. }) => {
            if output_saved {
                println!(
                    "The plan was saved to {} and will be used as context.",
                    layout.output_path(step).display()
                );
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    config::record_current_step(layout, step)?;
    print_outcome(&outcome, options);
    Ok(())
}

fn print_outcome(outcome: &StepOutcome, options: GenerateOptions) {
    if options.show_plan {
        println!("\n--- Plan for {} ---\n{}\n--- End of plan ---", outcome.step, outcome.plan_text.trim_end());
    }
    if outcome.used_placeholder {
        println!("warning: no template found for {}; a placeholder was used", outcome.step);
    }
    if !outcome.output_saved {
        println!("warning: the plan could not be saved as this step's output");
    }
    if !outcome.context_steps.is_empty() {
        let steps: Vec<String> = outcome.context_steps.iter().map(ToString::to_string).collect();
        println!("Context: {}", steps.join(", "));
    }
    print_report(&outcome.report, options.show_content);
}

/// Print an apply report the way `generate` shows it.
pub fn print_report(report: &ApplyReport, show_content: bool) {
    if report.is_empty() {
        println!("\nThe plan describes no file changes.");
        return;
    }

    if !report.created.is_empty() {
        println!("\nCreated ({}):", report.created_count());
        for file in &report.created {
            let note = if file.truncated { " (truncated)" } else { "" };
            println!("  + {} [{} bytes]{note}", file.path, file.bytes);
        }
    }

    if !report.flagged.is_empty() {
        println!("\nFlagged for review ({}):", report.flagged_count());
        for action in &report.flagged {
            println!("  ! {} {} ({})", action.operation, action.path, action.reason);
            if show_content && !action.content.is_empty() {
                println!("    --- suggested content ---");
                for line in action.content.lines() {
                    println!("    {line}");
                }
                println!("    --- end ---");
            }
        }
        if !report.apply_enabled {
            println!("  Re-run with --apply to create new files automatically.");
        }
    }

    if !report.skipped.is_empty() {
        println!("\nSkipped ({}):", report.skipped_count());
        for action in &report.skipped {
            println!("  - {} ({})", action.path, action.reason);
        }
    }
}
