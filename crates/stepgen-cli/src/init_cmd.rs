//! `stepgen init`: create `.stepgen/` and customize the step templates.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use stepgen_core::ProjectLayout;
use stepgen_core::init::{InitRequest, initialize_project, resolve_template_source};
use stepgen_core::model::ModelSpec;
use stepgen_core::steps::StepCatalog;

use crate::config::{self, ProjectConfig};

pub async fn run_init(
    layout: &ProjectLayout,
    problem_description: &str,
    template_dir: Option<&Path>,
    force: bool,
    spec: ModelSpec,
) -> Result<()> {
    let problem = problem_description.trim();
    anyhow::ensure!(!problem.is_empty(), "problem description must not be empty");

    let model = spec.build().context("invalid model configuration")?;
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let template_source = resolve_template_source(template_dir, &cwd);
    println!("Template source: {template_source}");
    println!("Generating customized specifications for: \"{problem}\"");

    let catalog = StepCatalog::default();
    let request = InitRequest {
        problem_description: problem.to_string(),
        template_source,
        force,
    };
    let report = initialize_project(layout, &catalog, &model, &request).await?;

    let project_config = ProjectConfig {
        problem_description: problem.to_string(),
        template_directory: report.template_source.dir().map(Path::to_path_buf),
        current_step: None,
        initialized_at: Some(Utc::now()),
        model: Some(spec),
    };
    if let Err(e) = config::save_config(layout, &project_config) {
        let _ = std::fs::remove_dir_all(layout.state_dir());
        return Err(e);
    }

    println!();
    println!(
        "stepgen initialized in {} ({}/{} documents generated)",
        layout.state_dir().display(),
        report.generated_count(),
        report.documents.len()
    );
    for doc in report.fallbacks() {
        println!("  manual action required: {}", doc.file_name);
    }
    println!();
    println!("Next steps:");
    println!("  1. Review the specifications in {}", layout.spec_dir().display());
    println!("  2. Run `stepgen generate step1`");
    Ok(())
}
