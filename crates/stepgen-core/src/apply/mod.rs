//! The apply engine: turns extracted file actions into file-system effects.
//!
//! For each action, in plan order:
//! 1. Validate the path ([`path`]); failures are SKIPPED.
//! 2. Stat the target; an existing file forces MODIFY.
//! 3. MODIFY is always FLAGGED_FOR_REVIEW and never written.
//! 4. CREATE content is truncated ([`truncate`]).
//! 5. With apply disabled every CREATE is flagged; otherwise CREATEs are
//!    ordered by [`priority`] (stable) and written with `create_new`.
//!
//! Every failure is scoped to its own action.

pub mod path;
pub mod priority;
pub mod report;
pub mod truncate;

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::plan::{FileAction, OperationKind};

pub use path::{PROTECTED_DIRS, resolve_within_root, validate_relative_path};
pub use priority::{PriorityClass, SKELETON_MAX_LINES, classify};
pub use report::{
    ApplyDecision, ApplyReport, CreatedFile, FlaggedAction, ReviewReason, SkipReason, SkippedAction,
};
pub use truncate::{MAX_CONTENT_BYTES, MAX_CONTENT_LINES, SizeLimits, truncate_content};

/// Tunables for the apply engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPolicy {
    pub limits: SizeLimits,
    /// First path components no action may target.
    pub protected_dirs: Vec<String>,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            limits: SizeLimits::default(),
            protected_dirs: PROTECTED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// A CREATE action waiting to be written.
struct PendingWrite {
    class: PriorityClass,
    path: String,
    target: PathBuf,
    content: String,
    truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyEngine {
    policy: ApplyPolicy,
}

impl ApplyEngine {
    pub fn new(policy: ApplyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ApplyPolicy {
        &self.policy
    }

    /// Fill in `exists_already` (and force MODIFY) for every action whose
    /// path is valid. Invalid paths are returned unchanged.
    pub fn resolve_existence(&self, actions: &[FileAction], root: &Path) -> Vec<FileAction> {
        actions
            .iter()
            .map(|action| match self.locate(root, &action.path) {
                Ok((_, target)) => action.clone().resolve_existence(target_exists(&target)),
                Err(_) => action.clone(),
            })
            .collect()
    }

    /// Apply `actions` under `root`.
    pub fn apply(&self, actions: &[FileAction], root: &Path, apply_enabled: bool) -> ApplyReport {
        let mut report = ApplyReport {
            apply_enabled,
            ..ApplyReport::default()
        };
        let mut pending = Vec::new();

        for action in actions {
            let (normalized, target) = match self.locate(root, &action.path) {
                Ok(located) => located,
                Err(reason) => {
                    warn!(path = %action.path, %reason, "skipping action");
                    report.skipped.push(SkippedAction {
                        path: action.path.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let exists = target_exists(&target);
            let action = action.clone().resolve_existence(exists);

            if action.operation == OperationKind::Modify {
                let reason = if exists {
                    ReviewReason::ExistingFile
                } else {
                    ReviewReason::ModificationRequested
                };
                debug!(path = %normalized, %reason, "flagging modification");
                report.flagged.push(FlaggedAction {
                    path: normalized,
                    operation: action.operation,
                    reason,
                    content: action.content,
                    truncated: false,
                });
                continue;
            }

            let (content, truncated) =
                match truncate_content(&normalized, &action.content, self.policy.limits) {
                    Some(cut) => (cut, true),
                    None => (action.content, false),
                };
            if truncated {
                info!(path = %normalized, "content truncated");
            }

            if !apply_enabled {
                report.flagged.push(FlaggedAction {
                    path: normalized,
                    operation: OperationKind::Create,
                    reason: ReviewReason::ApplyDisabled,
                    content,
                    truncated,
                });
                continue;
            }

            pending.push(PendingWrite {
                class: classify(Path::new(&normalized), &content),
                path: normalized,
                target,
                content,
                truncated,
            });
        }

        // Stable: equal classes keep plan order.
        pending.sort_by_key(|p| p.class);

        for write in pending {
            match write_new_file(&write.target, &write.content) {
                Ok(()) => {
                    info!(path = %write.path, class = ?write.class, "created file");
                    report.created.push(CreatedFile {
                        bytes: write.content.len(),
                        path: write.path,
                        truncated: write.truncated,
                    });
                }
                Err(reason) => {
                    warn!(path = %write.path, %reason, "could not create file");
                    report.flagged.push(FlaggedAction {
                        path: write.path,
                        operation: OperationKind::Create,
                        reason,
                        content: write.content,
                        truncated: write.truncated,
                    });
                }
            }
        }

        info!(
            created = report.created_count(),
            flagged = report.flagged_count(),
            skipped = report.skipped_count(),
            apply_enabled,
            "apply finished"
        );
        report
    }

    /// Validate a plan path and resolve it to `(normalized, absolute target)`.
    fn locate(&self, root: &Path, raw: &str) -> Result<(String, PathBuf), SkipReason> {
        let relative = validate_relative_path(raw, self.policy.protected_dirs.as_slice())?;
        let target = resolve_within_root(root, &relative)?;
        let normalized = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok((normalized, target))
    }
}

/// Apply `actions` with the default policy.
pub fn apply(actions: &[FileAction], root: &Path, apply_enabled: bool) -> ApplyReport {
    ApplyEngine::default().apply(actions, root, apply_enabled)
}

/// Anything at the path, including a dangling symlink, counts as existing.
fn target_exists(target: &Path) -> bool {
    target.symlink_metadata().is_ok()
}

/// Create `target` and write `content`, never replacing an existing file.
///
/// Only a target that already exists is reported as [`ReviewReason::ExistingFile`];
/// a file standing where a parent directory should be is a write error. A
/// partially written file is removed before the error is returned.
fn write_new_file(target: &Path, content: &str) -> Result<(), ReviewReason> {
    let write_error = |e: std::io::Error| ReviewReason::WriteError { message: e.to_string() };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(ReviewReason::ExistingFile),
        Err(e) => return Err(write_error(e)),
    };
    if let Err(e) = file.write_all(content.as_bytes()).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = std::fs::remove_file(target);
        return Err(write_error(e));
    }
    Ok(())
}
