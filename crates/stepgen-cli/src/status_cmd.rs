//! `stepgen status`: show each step's template and output and the current
//! step.

use anyhow::Result;

use stepgen_core::ProjectLayout;
use stepgen_core::steps::StepCatalog;

use crate::config;

pub fn run_status(layout: &ProjectLayout) -> Result<()> {
    let project = config::load_config(layout)?;
    let catalog = StepCatalog::default();

    println!("Project: {}", layout.root().display());
    println!("Problem: {}", project.problem_description);
    if let Some(at) = project.initialized_at {
        println!("Initialized: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    match project.current_step {
        Some(step) => println!("Current step: {step}"),
        None => println!("Current step: none"),
    }
    println!();

    println!("{:<8} {:<10} {:<8} TITLE", "STEP", "TEMPLATE", "OUTPUT");
    for def in catalog.steps() {
        let template = if layout.spec_dir().join(&def.template_file).is_file() {
            "yes"
        } else {
            "missing"
        };
        let output = if layout.output_path(def.id).is_file() { "yes" } else { "-" };
        let marker = if project.current_step == Some(def.id) { " <" } else { "" };
        println!("{:<8} {:<10} {:<8} {}{marker}", def.id.to_string(), template, output, def.title);
    }

    if let Some(next) = catalog.next_after(project.current_step) {
        println!();
        println!("Next: stepgen generate {next}");
    }
    Ok(())
}
