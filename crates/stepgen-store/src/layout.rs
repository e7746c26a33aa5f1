use std::env;
use std::path::{Path, PathBuf};

use crate::models::StepId;
use crate::outputs::FsOutputStore;

/// Where a project's stepgen state lives on disk.
///
/// The project root is the directory generated files are written into. The
/// tool's own state sits beside them in `<root>/.stepgen/`:
///
/// ```text
/// <root>/.stepgen/
///     config.toml
///     spec/      customized step templates
///     outputs/   step<N>_output.md, one per generated step
/// ```
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// Name of the state directory under the project root.
    pub const STATE_DIR: &str = ".stepgen";
    /// Templates subdirectory of the state directory.
    pub const SPEC_SUBDIR: &str = "spec";
    /// Step outputs subdirectory of the state directory.
    pub const OUTPUT_SUBDIR: &str = "outputs";
    /// Project config file name.
    pub const CONFIG_FILE: &str = "config.toml";

    /// Build a layout rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build a layout from the environment.
    ///
    /// Priority: `STEPGEN_PROJECT_ROOT` env var, then the current directory.
    pub fn from_env() -> Self {
        let root = env::var("STEPGEN_PROJECT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(Self::STATE_DIR)
    }

    pub fn spec_dir(&self) -> PathBuf {
        self.state_dir().join(Self::SPEC_SUBDIR)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.state_dir().join(Self::OUTPUT_SUBDIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join(Self::CONFIG_FILE)
    }

    /// Path of the output file for a step.
    pub fn output_path(&self, step: StepId) -> PathBuf {
        self.outputs_dir().join(FsOutputStore::file_name(step))
    }

    /// A project counts as initialized once both state subdirectories exist.
    pub fn is_initialized(&self) -> bool {
        self.spec_dir().is_dir() && self.outputs_dir().is_dir()
    }

    /// Create the state directory tree if it does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.spec_dir())?;
        std::fs::create_dir_all(self.outputs_dir())?;
        Ok(())
    }

    /// The file-backed output store for this project.
    pub fn output_store(&self) -> FsOutputStore {
        FsOutputStore::new(self.outputs_dir())
    }
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::from_env()
    }
}
