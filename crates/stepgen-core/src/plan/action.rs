//! The structured file actions extracted from a plan.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a plan wants done to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Modify,
}

impl OperationKind {
    /// Map a free-form operation label onto a kind.
    ///
    /// Only labels that clearly mean "new file" become [`Create`]; anything
    /// else, including unknown labels, becomes [`Modify`] so it always goes
    /// to manual review.
    ///
    /// [`Create`]: OperationKind::Create
    /// [`Modify`]: OperationKind::Modify
    pub fn normalize(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "create" | "created" | "new" | "new_file" | "add" | "added" | "create_file" => {
                Self::Create
            }
            _ => Self::Modify,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Modify => write!(f, "MODIFY"),
        }
    }
}

/// One file-level intent extracted from a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAction {
    /// Project-relative path as the plan stated it.
    pub path: String,
    pub operation: OperationKind,
    /// Suggested content. May be partial.
    pub content: String,
    /// Whether the target existed on disk when checked. The parser leaves
    /// this `false`; the apply engine fills it in.
    #[serde(default)]
    pub exists_already: bool,
}

impl FileAction {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: OperationKind::Create,
            content: content.into(),
            exists_already: false,
        }
    }

    pub fn modify(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: OperationKind::Modify,
            content: content.into(),
            exists_already: false,
        }
    }

    /// Record whether the target exists. An existing target always forces
    /// [`OperationKind::Modify`], whatever the plan claimed.
    pub fn resolve_existence(mut self, exists: bool) -> Self {
        self.exists_already = exists;
        if exists {
            self.operation = OperationKind::Modify;
        }
        self
    }
}
