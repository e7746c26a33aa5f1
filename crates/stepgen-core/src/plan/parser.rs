//! Plan parsing: turning free-form plan text into [`FileAction`]s.
//!
//! Parsing is a second, narrowly scoped model call whose only job is to
//! restate the plan as JSON. The response is untrusted and validated here:
//! - The first JSON value that looks like an action list is used, wherever it
//!   sits in the response (code fences and chatter are tolerated).
//! - A truncated array still yields the complete objects before the cut.
//! - Elements without a usable `path` are dropped; unknown operations become
//!   [`OperationKind::Modify`].

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::action::{FileAction, OperationKind};
use crate::model::Model;

/// Errors from extracting actions out of a plan.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("model {model} failed to extract file actions: {source}")]
    Extraction {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("extraction response could not be decoded: {reason}")]
    Undecodable { reason: String },
}

/// How many `[`/`{` positions are tried before giving up on a response.
const MAX_CANDIDATES: usize = 64;

/// Object keys that may wrap the action array.
const WRAPPER_KEYS: &[&str] = &["actions", "files", "file_actions", "changes"];

const EXTRACTION_SCHEMA: &str = r#"[
  {
    "path": "relative/path/from/project/root.ext",
    "operation": "create" | "modify",
    "content": "full file content as a JSON string"
  }
]"#;

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Build the extraction prompt for a plan.
pub fn build_extraction_prompt(plan_text: &str) -> String {
    format!(
        "Extract every file creation or modification described in the plan below.\n\
         Respond with ONLY a JSON array matching this schema, with no prose and no \
         code fences:\n\n{EXTRACTION_SCHEMA}\n\n\
         Rules:\n\
         - `path` is relative to the project root.\n\
         - `operation` is \"create\" for new files and \"modify\" for changes to existing files.\n\
         - `content` is the complete content given in the plan, or an empty string if none.\n\
         - If the plan describes no file changes, respond with [].\n\n\
         --- PLAN ---\n{plan}\n--- END PLAN ---\n",
        plan = plan_text.trim_end(),
    )
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the file actions a plan describes.
///
/// A blank plan yields no actions without calling the model.
pub async fn parse_plan(model: &dyn Model, plan_text: &str) -> Result<Vec<FileAction>, PlanParseError> {
    if plan_text.trim().is_empty() {
        debug!("plan is blank; nothing to extract");
        return Ok(Vec::new());
    }

    let prompt = build_extraction_prompt(plan_text);
    let response = model
        .complete(&prompt)
        .await
        .map_err(|e| PlanParseError::Extraction {
            model: model.name().to_string(),
            source: e.into(),
        })?;

    let actions = decode_actions(&response)?;
    info!(actions = actions.len(), "file actions extracted");
    Ok(actions)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Keys accepted for each field, canonical name first. The first key
/// present with a string value wins, so an unrelated `"type": "markdown"`
/// next to `"operation"` is ignored rather than rejected.
const PATH_KEYS: &[&str] = &["path", "file_path", "filename", "file"];
const OPERATION_KEYS: &[&str] = &["operation", "action", "op", "type"];
const CONTENT_KEYS: &[&str] = &["content", "contents", "code"];

fn first_string<'a>(element: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| element.get(*key).and_then(Value::as_str))
}

/// Build an action from one extracted element. `None` when the element is
/// not an object or has no usable path.
fn element_to_action(element: &Value) -> Option<FileAction> {
    let element = element.as_object()?;
    let path = normalize_path(first_string(element, PATH_KEYS)?)?;
    let operation = OperationKind::normalize(first_string(element, OPERATION_KEYS).unwrap_or_default());
    Some(FileAction {
        path,
        operation,
        content: first_string(element, CONTENT_KEYS).unwrap_or_default().to_string(),
        exists_already: false,
    })
}

fn normalize_path(raw: &str) -> Option<String> {
    let mut path = raw.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    (!path.is_empty()).then(|| path.to_string())
}

/// Decode an extraction response into validated actions.
///
/// Fails only when no action list can be found at all, or when every element
/// of the list is unusable. An empty list is a valid "no changes" answer.
pub fn decode_actions(response: &str) -> Result<Vec<FileAction>, PlanParseError> {
    let elements = locate_elements(response).ok_or_else(|| PlanParseError::Undecodable {
        reason: "no JSON action list found in response".to_string(),
    })?;

    let total = elements.len();
    let actions: Vec<FileAction> = elements
        .iter()
        .enumerate()
        .filter_map(|(index, element)| {
            let action = element_to_action(element);
            if action.is_none() {
                warn!(index, "dropping action element without a usable path");
                debug!(%element, "dropped element");
            }
            action
        })
        .collect();

    if total > 0 && actions.is_empty() {
        return Err(PlanParseError::Undecodable {
            reason: format!("none of the {total} extracted elements has a usable path"),
        });
    }
    if actions.len() < total {
        warn!(kept = actions.len(), dropped = total - actions.len(), "some action elements were unusable");
    }
    Ok(actions)
}

/// Find the action elements in a response.
///
/// Candidates are tried left to right. An array that fails to parse (cut off
/// mid-stream, or followed by a closing code fence instead of `]`) still
/// yields the complete objects before the failure, and that recovery wins
/// over anything found later in the response, since later candidates are
/// only fragments of the same array.
fn locate_elements(response: &str) -> Option<Vec<Value>> {
    let candidates = response
        .char_indices()
        .filter(|(_, c)| matches!(c, '[' | '{'))
        .map(|(i, _)| i)
        .take(MAX_CANDIDATES);

    for start in candidates {
        let slice = &response[start..];
        let mut stream = serde_json::Deserializer::from_str(slice).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                if let Some(elements) = action_elements(value) {
                    return Some(elements);
                }
            }
            Some(Err(e)) if slice.starts_with('[') => {
                let recovered = recover_complete_objects(slice);
                if !recovered.is_empty() {
                    warn!(
                        error = %e,
                        recovered = recovered.len(),
                        "extraction response holds an unterminated action list; keeping complete elements"
                    );
                    return Some(recovered);
                }
            }
            _ => {}
        }
    }
    None
}

/// Interpret a decoded JSON value as a list of action elements.
///
/// Arrays of scalars (e.g. a `[1]` footnote in prose) are not action lists.
fn action_elements(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if items.is_empty() || items.iter().any(Value::is_object) => Some(items),
        Value::Array(_) => None,
        Value::Object(mut map) => {
            for key in WRAPPER_KEYS {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Some(items);
                }
            }
            let single = ["path", "file", "file_path", "filename"]
                .iter()
                .any(|k| map.contains_key(*k));
            single.then(|| vec![Value::Object(map)])
        }
        _ => None,
    }
}

/// Collect every complete top-level object inside an unterminated array.
fn recover_complete_objects(slice: &str) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut object_start = None;

    // Skip the opening '['.
    for (i, c) in slice.char_indices().skip(1) {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => {
                if depth == 0 && c == '{' {
                    object_start = Some(i);
                }
                depth += 1;
            }
            '}' | ']' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                if depth == 0 && c == '}' {
                    if let Some(start) = object_start.take() {
                        if let Ok(value) = serde_json::from_str::<Value>(&slice[start..=i]) {
                            objects.push(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingModel {
        response: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingModel {
        fn new(response: Result<&str, &str>) -> Self {
            Self {
                response: response.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Model for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.response.clone().map_err(|e| anyhow!(e))
        }
    }

    #[test]
    fn decodes_plain_array() {
        let actions = decode_actions(
            r#"[{"path":"README.md","operation":"create","content":"hi"},
                {"path":"src/app.py","operation":"modify","content":""}]"#,
        )
        .unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], FileAction::create("README.md", "hi"));
        assert_eq!(actions[1].operation, OperationKind::Modify);
    }

    #[test]
    fn decodes_array_inside_code_fence_and_prose() {
        let response = "Here are the actions:\n```json\n[{\"path\": \"a.txt\", \"operation\": \"new\", \"content\": \"x\"}]\n```\nDone.";
        let actions = decode_actions(response).unwrap();
        assert_eq!(actions, vec![FileAction::create("a.txt", "x")]);
    }

    #[test]
    fn skips_bracketed_prose_before_json() {
        let response = "See [the docs] first. [{\"path\":\"b.md\",\"operation\":\"create\"}]";
        let actions = decode_actions(response).unwrap();
        assert_eq!(actions[0].path, "b.md");
        assert_eq!(actions[0].content, "");
    }

    #[test]
    fn scalar_arrays_are_not_action_lists() {
        let response = "Per the plan [1, 2]:\n[{\"path\":\"c.toml\",\"operation\":\"create\",\"content\":\"\"}]";
        let actions = decode_actions(response).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].path, "c.toml");
    }

    #[test]
    fn decodes_wrapped_object_and_aliases() {
        let response = r#"{"actions":[{"file_path":"./src/x.rs","action":"Create","contents":"fn x() {}"}]}"#;
        let actions = decode_actions(response).unwrap();
        assert_eq!(actions, vec![FileAction::create("src/x.rs", "fn x() {}")]);
    }

    #[test]
    fn decodes_single_object() {
        let actions = decode_actions(r#"{"path":"one.txt","operation":"create","content":"1"}"#).unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn unknown_or_missing_operation_becomes_modify() {
        let actions = decode_actions(
            r#"[{"path":"a","operation":"rewrite"},{"path":"b"}]"#,
        )
        .unwrap();
        assert!(actions.iter().all(|a| a.operation == OperationKind::Modify));
    }

    #[test]
    fn blank_paths_are_dropped_but_others_kept() {
        let actions = decode_actions(
            r#"[{"path":"  ","operation":"create"},{"operation":"create"},{"path":"ok.md","operation":"create"}]"#,
        )
        .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].path, "ok.md");
    }

    #[test]
    fn truncated_array_keeps_complete_elements() {
        let response = r#"[{"path":"a.md","operation":"create","content":"has } and { in it"},
                           {"path":"b.md","operation":"create","content":"cut off he"#;
        let actions = decode_actions(response).unwrap();
        assert_eq!(actions, vec![FileAction::create("a.md", "has } and { in it")]);
    }

    #[test]
    fn unrelated_type_key_does_not_shadow_operation() {
        let actions =
            decode_actions(r##"[{"path":"README.md","type":"markdown","operation":"create","content":"# hi"}]"##)
                .unwrap();
        assert_eq!(actions, vec![FileAction::create("README.md", "# hi")]);
    }

    #[test]
    fn canonical_path_key_wins_over_alias() {
        let actions = decode_actions(
            r#"[{"file":"other.md","path":"a.md","operation":"create","content":"a"},
                {"path":"b.md","operation":"create","content":"b"}]"#,
        )
        .unwrap();
        let paths: Vec<&str> = actions.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);
    }

    #[test]
    fn non_string_alias_values_fall_through() {
        let actions = decode_actions(r#"[{"path":42,"file":"c.md","operation":"create"}]"#).unwrap();
        assert_eq!(actions[0].path, "c.md");
    }

    #[test]
    fn array_cut_off_inside_code_fence_keeps_every_complete_element() {
        let response = "```json\n\
                        [{\"path\":\"a.md\",\"operation\":\"create\",\"content\":\"a\"},\n \
                        {\"path\":\"b.md\",\"operation\":\"create\",\"content\":\"b\"},\n\
                        ```";
        let actions = decode_actions(response).unwrap();
        let paths: Vec<&str> = actions.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);
    }

    #[test]
    fn empty_array_is_no_actions() {
        assert!(decode_actions("[]").unwrap().is_empty());
    }

    #[test]
    fn prose_only_is_undecodable() {
        let err = decode_actions("I could not find any file changes.").unwrap_err();
        assert!(matches!(err, PlanParseError::Undecodable { .. }));
    }

    #[test]
    fn all_invalid_elements_is_undecodable() {
        let err = decode_actions(r#"[{"operation":"create"}, 42, "str"]"#).unwrap_err();
        assert!(err.to_string().contains("usable path"), "got: {err}");
    }

    #[tokio::test]
    async fn blank_plan_skips_model_call() {
        let model = RecordingModel::new(Ok("[]"));
        let actions = parse_plan(&model, "   ").await.unwrap();
        assert!(actions.is_empty());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_prompt_carries_plan_text() {
        let model = RecordingModel::new(Ok(r#"[{"path":"x","operation":"create"}]"#));
        parse_plan(&model, "Create file x").await.unwrap();
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("--- PLAN ---\nCreate file x\n--- END PLAN ---"));
        assert!(prompts[0].contains("\"operation\""));
    }

    #[tokio::test]
    async fn extraction_error_is_reported() {
        let model = RecordingModel::new(Err("timed out"));
        let err = parse_plan(&model, "plan").await.unwrap_err();
        assert!(matches!(err, PlanParseError::Extraction { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
