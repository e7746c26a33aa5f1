//! Integration tests for the file-backed output store.

use stepgen_store::{FsOutputStore, OutputStore, ProjectLayout, StepId};

fn step(n: u32) -> StepId {
    StepId::new(n).unwrap()
}

#[test]
fn missing_output_loads_as_none() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = FsOutputStore::new(tmp.path().join("outputs"));
    assert_eq!(store.load_output(step(1)).unwrap(), None);
}

#[test]
fn save_then_load_returns_text_verbatim() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = FsOutputStore::new(tmp.path().join("outputs"));

    let text = "# Plan\n\n```python\nprint('hi')\n```\n  trailing spaces  \n";
    store.save_output(step(2), text).unwrap();

    assert_eq!(store.load_output(step(2)).unwrap().as_deref(), Some(text));
}

#[test]
fn save_overwrites_previous_output() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = FsOutputStore::new(tmp.path());

    store.save_output(step(1), "first").unwrap();
    store.save_output(step(1), "second").unwrap();

    assert_eq!(store.load_output(step(1)).unwrap().as_deref(), Some("second"));
}

#[test]
fn save_creates_missing_directory() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().join("deep").join("outputs");
    let store = FsOutputStore::new(&dir);

    store.save_output(step(4), "text").unwrap();
    assert!(dir.join("step4_output.md").is_file());
}

#[test]
fn list_outputs_is_sorted_and_ignores_other_files() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = FsOutputStore::new(tmp.path());

    store.save_output(step(10), "ten").unwrap();
    store.save_output(step(2), "two").unwrap();
    store.save_output(step(9), "nine").unwrap();
    std::fs::write(tmp.path().join("notes.md"), "unrelated").unwrap();

    let listed: Vec<String> = store
        .list_outputs()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(listed, vec!["step2", "step9", "step10"]);
}

#[test]
fn list_outputs_of_missing_dir_is_empty() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = FsOutputStore::new(tmp.path().join("nope"));
    assert!(store.list_outputs().unwrap().is_empty());
}

#[test]
fn layout_store_writes_into_outputs_dir() {
    let tmp = tempfile::TempDir::new().unwrap();
    let layout = ProjectLayout::new(tmp.path());
    layout.ensure_dirs().unwrap();

    layout.output_store().save_output(step(3), "plan").unwrap();

    let on_disk = std::fs::read_to_string(layout.output_path(step(3))).unwrap();
    assert_eq!(on_disk, "plan");
}

#[test]
fn unreadable_output_is_an_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = FsOutputStore::new(tmp.path());
    // A directory where the file should be cannot be read as text.
    std::fs::create_dir_all(tmp.path().join("step1_output.md")).unwrap();

    assert!(store.load_output(step(1)).is_err());
}
