//! Content size limits for auto-created files.

use std::path::Path;

/// Maximum number of lines kept in a created file.
pub const MAX_CONTENT_LINES: usize = 400;

/// Maximum number of bytes kept in a created file, excluding the marker.
pub const MAX_CONTENT_BYTES: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_lines: usize,
    pub max_bytes: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_lines: MAX_CONTENT_LINES,
            max_bytes: MAX_CONTENT_BYTES,
        }
    }
}

/// Cut `content` to `limits`, or return `None` if it already fits.
///
/// Whole lines are kept greedily while both limits hold, then a one-line
/// truncation marker in the file's comment syntax is appended. A line is
/// never split, so the kept prefix always ends with `\n`.
pub fn truncate_content(path: &str, content: &str, limits: SizeLimits) -> Option<String> {
    let mut kept_bytes = 0;
    let mut kept_lines = 0;

    for line in content.split_inclusive('\n') {
        if kept_lines == limits.max_lines || kept_bytes + line.len() > limits.max_bytes {
            let mut truncated = content[..kept_bytes].to_string();
            truncated.push_str(&truncation_marker(path, limits));
            truncated.push('\n');
            return Some(truncated);
        }
        kept_bytes += line.len();
        kept_lines += 1;
    }
    None
}

/// The marker line (without its trailing newline) for a file at `path`.
pub fn truncation_marker(path: &str, limits: SizeLimits) -> String {
    let note = format!(
        "TRUNCATED by stepgen: content exceeded {} lines or {} bytes; \
         a follow-up generation pass is expected to complete this file.",
        limits.max_lines, limits.max_bytes
    );
    match comment_style(path) {
        CommentStyle::Line(prefix) => format!("{prefix} {note}"),
        CommentStyle::Block(open, close) => format!("{open} {note} {close}"),
        CommentStyle::Plain => format!("[{note}]"),
    }
}

enum CommentStyle {
    Line(&'static str),
    Block(&'static str, &'static str),
    Plain,
}

fn comment_style(path: &str) -> CommentStyle {
    let path = Path::new(path);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if matches!(file_name.as_str(), "dockerfile" | "makefile" | ".gitignore" | ".env") {
        return CommentStyle::Line("#");
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "rs" | "js" | "mjs" | "cjs" | "ts" | "jsx" | "tsx" | "c" | "h" | "cc" | "cpp" | "hpp" | "java"
        | "kt" | "go" | "swift" | "scala" | "cs" | "dart" | "php" | "proto" => CommentStyle::Line("//"),
        "py" | "rb" | "sh" | "bash" | "zsh" | "yaml" | "yml" | "toml" | "pl" | "r" | "tf" | "ini" | "conf"
        | "cfg" | "env" | "dockerignore" => CommentStyle::Line("#"),
        "sql" | "lua" | "hs" => CommentStyle::Line("--"),
        "md" | "markdown" | "mdx" | "html" | "htm" | "xml" | "svg" | "vue" => {
            CommentStyle::Block("<!--", "-->")
        }
        "css" | "scss" | "less" => CommentStyle::Block("/*", "*/"),
        _ => CommentStyle::Plain,
    }
}
