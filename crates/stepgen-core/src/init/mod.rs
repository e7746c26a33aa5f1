//! Project initialization: customizing every step template for a problem.
//!
//! `init` reads each catalog template from a source directory (or uses the
//! built-in placeholder), asks the model to tailor it to the problem
//! description, and writes the result into `.stepgen/spec/`. A model failure
//! for one document writes a "manual action required" notice in its place
//! and moves on. A file-system failure aborts the run and removes the
//! partially created state directory.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use stepgen_store::{ProjectLayout, StepId};

use crate::model::Model;
use crate::steps::{SpecDocument, StepCatalog};
use crate::template::{placeholder_template, read_source_template};

/// Directory probed for templates when none is given.
pub const DEFAULT_TEMPLATE_DIR: &str = "spec";

#[derive(Debug, Error)]
pub enum InitError {
    #[error("{} already exists (use --force to replace it)", path.display())]
    AlreadyInitialized { path: PathBuf },

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the uncustomized templates come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum TemplateSource {
    Directory(PathBuf),
    Placeholders,
}

impl TemplateSource {
    pub fn dir(&self) -> Option<&Path> {
        match self {
            Self::Directory(dir) => Some(dir),
            Self::Placeholders => None,
        }
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(dir) => write!(f, "{}", dir.display()),
            Self::Placeholders => write!(f, "built-in placeholders"),
        }
    }
}

/// Pick the template source: the requested directory if it exists, else
/// `<cwd>/spec`, else placeholders.
pub fn resolve_template_source(requested: Option<&Path>, cwd: &Path) -> TemplateSource {
    if let Some(dir) = requested {
        if dir.is_dir() {
            return TemplateSource::Directory(absolute(dir, cwd));
        }
        warn!(dir = %dir.display(), "template directory not found");
    }

    let fallback = cwd.join(DEFAULT_TEMPLATE_DIR);
    if fallback.is_dir() {
        return TemplateSource::Directory(absolute(&fallback, cwd));
    }
    TemplateSource::Placeholders
}

fn absolute(dir: &Path, cwd: &Path) -> PathBuf {
    let joined = if dir.is_absolute() { dir.to_path_buf() } else { cwd.join(dir) };
    joined.canonicalize().unwrap_or(joined)
}

#[derive(Debug, Clone)]
pub struct InitRequest {
    pub problem_description: String,
    pub template_source: TemplateSource,
    /// Replace an existing `.stepgen/` directory.
    pub force: bool,
}

/// How one document was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Generated,
    /// The model failed; a manual-action notice was written instead.
    Fallback { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct InitDocument {
    pub file_name: String,
    pub step: Option<StepId>,
    /// The source template was missing and the placeholder was customized.
    pub from_placeholder: bool,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub template_source: TemplateSource,
    pub documents: Vec<InitDocument>,
}

impl InitReport {
    pub fn generated_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Generated)
            .count()
    }

    pub fn fallbacks(&self) -> impl Iterator<Item = &InitDocument> {
        self.documents
            .iter()
            .filter(|d| matches!(d.status, DocumentStatus::Fallback { .. }))
    }
}

/// Build the prompt that tailors one template to the problem.
pub fn build_customization_prompt(doc: &SpecDocument, problem: &str, template: &str) -> String {
    let task = if doc.step == Some(StepId::FIRST) {
        format!(
            "Your task is to create a detailed problem definition based on this description.\n\n\
             Template to follow:\n```\n{template}\n```\n\n\
             Generate a customized version of this document that:\n\
             1. Keeps every section and heading from the template.\n\
             2. Includes the exact problem description above in a \"Validated Problem Statement\" section.\n\
             3. Expands on it with context, target audience and core objectives.\n"
        )
    } else {
        format!(
            "Your task is to: {instruction}\n\n\
             Template to follow:\n```\n{template}\n```\n\n\
             Generate a customized version of this document that keeps every section and \
             heading from the template but adapts examples, suggestions and details to the \
             problem described above.\n",
            instruction = doc.instruction,
        )
    };

    format!(
        "You are writing a specification document for a software project.\n\n\
         The high-level problem description is:\n\"{problem}\"\n\n\
         {task}\n\
         The content should be clear, specific and actionable."
    )
}

/// The document written when the model could not customize a template.
pub fn manual_action_notice(file_name: &str, problem: &str, error: &str) -> String {
    format!(
        "# Error Generating {file_name}\n\n\
         There was an error generating this document: {error}\n\n\
         ## Manual Action Required\n\n\
         Please replace this file with the appropriate content for {file_name}.\n\n\
         The high-level problem description was:\n\"{problem}\"\n"
    )
}

/// Create `.stepgen/` under the layout root and customize every document in
/// the catalog.
pub async fn initialize_project(
    layout: &ProjectLayout,
    catalog: &StepCatalog,
    model: &dyn Model,
    request: &InitRequest,
) -> Result<InitReport, InitError> {
    let state_dir = layout.state_dir();
    if state_dir.exists() {
        if !request.force {
            return Err(InitError::AlreadyInitialized { path: state_dir });
        }
        info!(path = %state_dir.display(), "removing existing state directory");
        std::fs::remove_dir_all(&state_dir).map_err(|source| InitError::Io {
            action: "remove",
            path: state_dir.clone(),
            source,
        })?;
    }

    match write_documents(layout, catalog, model, request).await {
        Ok(report) => {
            info!(
                generated = report.generated_count(),
                total = report.documents.len(),
                source = %report.template_source,
                "project initialized"
            );
            Ok(report)
        }
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_dir_all(&state_dir) {
                warn!(path = %state_dir.display(), error = %cleanup, "failed to clean up after init error");
            }
            Err(e)
        }
    }
}

async fn write_documents(
    layout: &ProjectLayout,
    catalog: &StepCatalog,
    model: &dyn Model,
    request: &InitRequest,
) -> Result<InitReport, InitError> {
    layout.ensure_dirs().map_err(|source| InitError::Io {
        action: "create",
        path: layout.state_dir(),
        source,
    })?;

    let problem = request.problem_description.trim();
    let spec_dir = layout.spec_dir();
    let mut documents = Vec::new();

    for doc in catalog.spec_documents() {
        let source_text = read_source_template(request.template_source.dir(), &doc.file_name);
        let from_placeholder = source_text.is_none();
        let template = source_text.unwrap_or_else(|| placeholder_template(&doc.file_name));

        let prompt = build_customization_prompt(&doc, problem, &template);
        let (content, status) = match model.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => (text, DocumentStatus::Generated),
            Ok(_) => {
                let error = format!("model {} returned an empty response", model.name());
                warn!(file = %doc.file_name, %error, "writing manual action notice");
                (manual_action_notice(&doc.file_name, problem, &error), DocumentStatus::Fallback { error })
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(file = %doc.file_name, %error, "writing manual action notice");
                (manual_action_notice(&doc.file_name, problem, &error), DocumentStatus::Fallback { error })
            }
        };

        let path = spec_dir.join(&doc.file_name);
        std::fs::write(&path, content).map_err(|source| InitError::Io {
            action: "write",
            path: path.clone(),
            source,
        })?;
        info!(file = %doc.file_name, "spec document written");

        documents.push(InitDocument {
            file_name: doc.file_name,
            step: doc.step,
            from_placeholder,
            status,
        });
    }

    Ok(InitReport {
        template_source: request.template_source.clone(),
        documents,
    })
}
