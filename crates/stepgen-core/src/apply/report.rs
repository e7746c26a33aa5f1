//! The outcome of applying a batch of file actions.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::plan::OperationKind;

/// What happened to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyDecision {
    AutoCreated,
    FlaggedForReview,
    Skipped,
}

impl fmt::Display for ApplyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoCreated => write!(f, "AUTO_CREATED"),
            Self::FlaggedForReview => write!(f, "FLAGGED_FOR_REVIEW"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Why an action was left for a human.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewReason {
    /// The target already exists on disk.
    ExistingFile,
    /// Writes were not enabled for this run.
    ApplyDisabled,
    /// The plan asked to modify a file that does not exist.
    ModificationRequested,
    /// Writing the file failed.
    WriteError { message: String },
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExistingFile => write!(f, "existing file"),
            Self::ApplyDisabled => write!(f, "apply disabled"),
            Self::ModificationRequested => write!(f, "modification requested"),
            Self::WriteError { message } => write!(f, "write error: {message}"),
        }
    }
}

impl Serialize for ReviewReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Why an action was rejected outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EmptyPath,
    EscapesRoot,
    Protected { dir: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "empty path"),
            Self::EscapesRoot => write!(f, "path escapes project root"),
            Self::Protected { dir } => write!(f, "path targets protected directory {dir}"),
        }
    }
}

impl Serialize for SkipReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedFile {
    pub path: String,
    pub bytes: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedAction {
    pub path: String,
    pub operation: OperationKind,
    pub reason: ReviewReason,
    /// Suggested content, truncated for CREATE actions.
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAction {
    /// The path exactly as the plan gave it.
    pub path: String,
    pub reason: SkipReason,
}

/// Per-decision lists for one apply run.
///
/// `created` is in write order; `flagged` and `skipped` follow plan order,
/// except that write failures are appended after the planned entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub apply_enabled: bool,
    pub created: Vec<CreatedFile>,
    pub flagged: Vec<FlaggedAction>,
    pub skipped: Vec<SkippedAction>,
}

impl ApplyReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.flagged.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The decision recorded for `path`, matched against the normalized path
    /// (or the raw path for skipped actions).
    pub fn decision_for(&self, path: &str) -> Option<ApplyDecision> {
        if self.created.iter().any(|c| c.path == path) {
            Some(ApplyDecision::AutoCreated)
        } else if self.flagged.iter().any(|f| f.path == path) {
            Some(ApplyDecision::FlaggedForReview)
        } else if self.skipped.iter().any(|s| s.path == path) {
            Some(ApplyDecision::Skipped)
        } else {
            None
        }
    }

    /// The flagged entry for `path`, if any.
    pub fn flagged_entry(&self, path: &str) -> Option<&FlaggedAction> {
        self.flagged.iter().find(|f| f.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_render_as_plain_text() {
        assert_eq!(ReviewReason::ExistingFile.to_string(), "existing file");
        assert_eq!(ReviewReason::ApplyDisabled.to_string(), "apply disabled");
        assert_eq!(
            ReviewReason::WriteError { message: "permission denied".into() }.to_string(),
            "write error: permission denied"
        );
        assert_eq!(SkipReason::EscapesRoot.to_string(), "path escapes project root");
    }

    #[test]
    fn report_serializes_decisions_and_reasons() {
        let report = ApplyReport {
            apply_enabled: true,
            created: vec![],
            flagged: vec![FlaggedAction {
                path: "app/config.py".into(),
                operation: OperationKind::Modify,
                reason: ReviewReason::ExistingFile,
                content: String::new(),
                truncated: false,
            }],
            skipped: vec![SkippedAction {
                path: "../x".into(),
                reason: SkipReason::EscapesRoot,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["flagged"][0]["reason"], "existing file");
        assert_eq!(json["flagged"][0]["operation"], "modify");
        assert_eq!(json["skipped"][0]["reason"], "path escapes project root");
        assert_eq!(
            serde_json::to_value(ApplyDecision::FlaggedForReview).unwrap(),
            "FLAGGED_FOR_REVIEW"
        );
    }

    #[test]
    fn decision_lookup() {
        let report = ApplyReport {
            apply_enabled: true,
            created: vec![CreatedFile { path: "a".into(), bytes: 1, truncated: false }],
            ..ApplyReport::default()
        };
        assert_eq!(report.decision_for("a"), Some(ApplyDecision::AutoCreated));
        assert_eq!(report.decision_for("b"), None);
        assert_eq!(report.total(), 1);
    }
}
