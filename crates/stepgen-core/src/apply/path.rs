//! Path validation for plan-supplied file paths.
//!
//! A plan path is untrusted. It must be relative, must stay inside the
//! project root after `..` is resolved, must not target a protected
//! directory, and must not reach outside the root through a symlinked
//! parent directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::report::SkipReason;

/// Directories no plan may write into.
pub const PROTECTED_DIRS: &[&str] = &[".stepgen", ".git"];

/// Lexically validate and normalize a plan path.
///
/// `.` components are dropped and `..` pops the previous component; popping
/// past the root is an escape.
pub fn validate_relative_path<S: AsRef<str>>(raw: &str, protected_dirs: &[S]) -> Result<PathBuf, SkipReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SkipReason::EmptyPath);
    }
    if trimmed.contains('\0') {
        return Err(SkipReason::EscapesRoot);
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(SkipReason::EscapesRoot);
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(SkipReason::EscapesRoot),
        }
    }

    let Some(Component::Normal(first)) = normalized.components().next() else {
        return Err(SkipReason::EmptyPath);
    };
    if let Some(dir) = protected_dirs
        .iter()
        .map(|dir| dir.as_ref())
        .find(|dir| first.to_str() == Some(*dir))
    {
        return Err(SkipReason::Protected { dir: dir.to_string() });
    }

    Ok(normalized)
}

/// Join a validated relative path onto `root` and make sure no existing
/// ancestor of the target is a symlink pointing outside `root`.
///
/// Only ancestors at or below `root` are inspected, so a root that does not
/// exist yet is accepted and created by the first write.
pub fn resolve_within_root(root: &Path, relative: &Path) -> Result<PathBuf, SkipReason> {
    let target = root.join(relative);
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    for dir in target.ancestors().skip(1).take_while(|dir| dir.starts_with(root)) {
        match dir.canonicalize() {
            Ok(resolved) if resolved.starts_with(&canonical_root) => break,
            Ok(_) => return Err(SkipReason::EscapesRoot),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            // Unreadable ancestors surface later as write errors.
            Err(_) => break,
        }
    }
    Ok(target)
}
