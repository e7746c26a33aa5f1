//! Step template loading.
//!
//! The pipeline reads each step's specification template through the
//! [`TemplateProvider`] trait. [`DirTemplateProvider`] serves them from the
//! project's `.stepgen/spec/` directory. When a template cannot be loaded,
//! callers fall back to [`placeholder_template`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use stepgen_store::StepId;

use crate::steps::StepCatalog;

/// Errors from loading a step template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("{0} is not a step in the catalog")]
    UnknownStep(StepId),

    #[error("template for {step} not found at {}", path.display())]
    Missing { step: StepId, path: PathBuf },

    #[error("failed to read template for {step} at {}: {source}", path.display())]
    Unreadable {
        step: StepId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of step specification templates.
pub trait TemplateProvider: Send + Sync {
    fn load_template(&self, step: StepId) -> Result<String, TemplateError>;
}

/// Serves templates from a directory, using the catalog to map step ids to
/// file names.
#[derive(Debug, Clone)]
pub struct DirTemplateProvider {
    dir: PathBuf,
    catalog: StepCatalog,
}

impl DirTemplateProvider {
    pub fn new(dir: impl Into<PathBuf>, catalog: StepCatalog) -> Self {
        Self {
            dir: dir.into(),
            catalog,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a step's template is expected at, if the step is known.
    pub fn template_path(&self, step: StepId) -> Option<PathBuf> {
        self.catalog
            .get(step)
            .map(|def| self.dir.join(&def.template_file))
    }
}

impl TemplateProvider for DirTemplateProvider {
    fn load_template(&self, step: StepId) -> Result<String, TemplateError> {
        let path = self
            .template_path(step)
            .ok_or(TemplateError::UnknownStep(step))?;

        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TemplateError::Missing { step, path }),
            Err(source) => Err(TemplateError::Unreadable { step, path, source }),
        }
    }
}

/// Minimal stand-in used when a template cannot be found or read.
pub fn placeholder_template(name: &str) -> String {
    format!(
        "# {name}\n\n\
         This is a minimal placeholder template for {name} because the original \
         could not be found or read.\n\n\
         Please customize this file with appropriate sections and content based \
         on the project's needs.\n"
    )
}

/// Load a step's template, substituting the placeholder on any failure.
///
/// Returns the template text and whether the placeholder was used.
pub fn load_or_placeholder(provider: &dyn TemplateProvider, step: StepId) -> (String, bool) {
    match provider.load_template(step) {
        Ok(text) => (text, false),
        Err(e) => {
            warn!(%step, error = %e, "using placeholder template");
            (placeholder_template(&step.to_string()), true)
        }
    }
}

/// Read a named template from an optional source directory.
///
/// Used by `init`, which customizes templates from a user-supplied
/// directory. Returns `None` when there is no directory or the file is
/// missing or unreadable.
pub fn read_source_template(dir: Option<&Path>, file_name: &str) -> Option<String> {
    let path = dir?.join(file_name);
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "template not readable");
            None
        }
    }
}
