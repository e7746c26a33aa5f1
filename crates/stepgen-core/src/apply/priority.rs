//! Write ordering for auto-created files.
//!
//! Documentation is written first, then small skeleton files, then
//! everything else, so an interrupted apply leaves the most useful files
//! behind.

use std::path::Path;

use serde::Serialize;

/// Files with at most this many lines count as skeletons.
pub const SKELETON_MAX_LINES: usize = 40;

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "txt", "rst", "adoc"];

const DOC_STEMS: &[&str] = &["readme", "changelog", "license", "contributing", "notice"];

/// Ordering class; lower classes are written first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    Documentation,
    Skeleton,
    Implementation,
}

/// Classify a file by path and content.
pub fn classify(path: &Path, content: &str) -> PriorityClass {
    if is_documentation(path) {
        PriorityClass::Documentation
    } else if content.lines().count() <= SKELETON_MAX_LINES {
        PriorityClass::Skeleton
    } else {
        PriorityClass::Implementation
    }
}

fn is_documentation(path: &Path) -> bool {
    let in_docs_dir = path
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .is_some_and(|first| first.eq_ignore_ascii_case("docs") && path.components().count() > 1);
    if in_docs_dir {
        return true;
    }

    let lower = |s: Option<&std::ffi::OsStr>| s.and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
    if lower(path.extension()).is_some_and(|ext| DOC_EXTENSIONS.contains(&ext.as_str())) {
        return true;
    }
    lower(path.file_stem()).is_some_and(|stem| DOC_STEMS.contains(&stem.as_str()))
}
