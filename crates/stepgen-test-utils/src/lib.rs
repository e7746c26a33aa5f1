//! Shared test utilities for stepgen integration tests.
//!
//! - [`ScriptedModel`]: a [`Model`] that replays queued responses and
//!   records every prompt it receives.
//! - [`MemoryOutputStore`]: an in-memory [`OutputStore`].
//! - [`TempProject`]: a temporary project root with helpers for seeding
//!   files and templates.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tempfile::TempDir;

use stepgen_core::model::Model;
use stepgen_core::steps::StepCatalog;
use stepgen_store::{OutputStore, ProjectLayout, StepId, StoreError};

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// A model that answers from a script.
///
/// Each call pops the next queued response. An exhausted script is an error
/// so tests notice unexpected extra calls.
pub struct ScriptedModel {
    name: String,
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response.
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Err(message.into()));
        self
    }

    /// Queue a plan response followed by its extraction response.
    pub fn plan_then_actions(self, plan: impl Into<String>, actions: serde_json::Value) -> Self {
        self.respond(plan).respond(actions.to_string())
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted model has no response queued")),
        }
    }
}

/// An extraction response describing `(path, operation, content)` triples.
pub fn actions_json(actions: &[(&str, &str, &str)]) -> serde_json::Value {
    serde_json::Value::Array(
        actions
            .iter()
            .map(|(path, operation, content)| {
                serde_json::json!({ "path": path, "operation": operation, "content": content })
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// MemoryOutputStore
// ---------------------------------------------------------------------------

/// An [`OutputStore`] that keeps outputs in memory.
#[derive(Default)]
pub struct MemoryOutputStore {
    outputs: Mutex<BTreeMap<StepId, String>>,
}

impl MemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(self, step: StepId, text: impl Into<String>) -> Self {
        self.outputs.lock().unwrap().insert(step, text.into());
        self
    }

    pub fn get(&self, step: StepId) -> Option<String> {
        self.outputs.lock().unwrap().get(&step).cloned()
    }
}

impl OutputStore for MemoryOutputStore {
    fn load_output(&self, step: StepId) -> Result<Option<String>, StoreError> {
        Ok(self.get(step))
    }

    fn save_output(&self, step: StepId, text: &str) -> Result<(), StoreError> {
        self.outputs.lock().unwrap().insert(step, text.to_string());
        Ok(())
    }

    fn list_outputs(&self) -> Result<Vec<StepId>, StoreError> {
        Ok(self.outputs.lock().unwrap().keys().copied().collect())
    }
}

// ---------------------------------------------------------------------------
// TempProject
// ---------------------------------------------------------------------------

/// A project rooted in a temporary directory, removed on drop.
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp project dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(self.root())
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write file");
        path
    }

    pub fn read_file(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.path(relative)).ok()
    }

    /// Create `.stepgen/` and write a template for every catalog step.
    pub fn with_templates(self, catalog: &StepCatalog) -> Self {
        let layout = self.layout();
        layout.ensure_dirs().expect("failed to create state dirs");
        for step in catalog.steps() {
            std::fs::write(
                layout.spec_dir().join(&step.template_file),
                format!("# {} template\n", step.title),
            )
            .expect("failed to write template");
        }
        self
    }

    /// Every file under the root except `.stepgen/`, as sorted relative paths.
    pub fn user_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_files(self.root(), self.root(), &mut files);
        files.retain(|f| !f.starts_with(ProjectLayout::STATE_DIR));
        files.sort();
        files
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}

/// Shorthand for `StepId::new(n).unwrap()`.
pub fn step(n: u32) -> StepId {
    StepId::new(n).expect("step numbers start at 1")
}
