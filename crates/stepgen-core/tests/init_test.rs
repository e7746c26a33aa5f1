//! Project initialization against a scripted model.

use stepgen_core::init::{DocumentStatus, InitError, InitRequest, TemplateSource, initialize_project};
use stepgen_core::steps::{AGENT_PLAN_FILE, StepCatalog};
use stepgen_test_utils::{ScriptedModel, TempProject};

fn request(source: TemplateSource, force: bool) -> InitRequest {
    InitRequest {
        problem_description: "A habit tracker".to_string(),
        template_source: source,
        force,
    }
}

fn scripted_for_all_documents(catalog: &StepCatalog) -> ScriptedModel {
    catalog
        .spec_documents()
        .iter()
        .fold(ScriptedModel::new(), |model, doc| model.respond(format!("customized {}", doc.file_name)))
}

#[tokio::test]
async fn writes_every_customized_document() {
    let project = TempProject::new();
    let catalog = StepCatalog::default();
    let model = scripted_for_all_documents(&catalog);

    let report = initialize_project(&project.layout(), &catalog, &model, &request(TemplateSource::Placeholders, false))
        .await
        .unwrap();

    assert_eq!(report.documents.len(), 7);
    assert_eq!(report.generated_count(), 7);
    assert!(report.documents.iter().all(|d| d.from_placeholder));
    let spec_dir = project.layout().spec_dir();
    assert_eq!(
        std::fs::read_to_string(spec_dir.join(AGENT_PLAN_FILE)).unwrap(),
        "customized agent-plan.md"
    );
    assert!(project.layout().outputs_dir().is_dir());
}

#[tokio::test]
async fn source_templates_are_sent_to_the_model() {
    let project = TempProject::new();
    project.write_file("templates/step1-problem-definition.md", "## Validated Problem Statement\n");
    let catalog = StepCatalog::default();
    let model = scripted_for_all_documents(&catalog);
    let source = TemplateSource::Directory(project.path("templates"));

    let report = initialize_project(&project.layout(), &catalog, &model, &request(source, false))
        .await
        .unwrap();

    assert!(!report.documents[0].from_placeholder);
    assert!(report.documents[1].from_placeholder);
    let first_prompt = &model.prompts()[0];
    assert!(first_prompt.contains("## Validated Problem Statement"));
    assert!(first_prompt.contains("\"A habit tracker\""));
}

#[tokio::test]
async fn model_failure_writes_manual_action_notice() {
    let project = TempProject::new();
    let catalog = StepCatalog::default();
    let model = catalog.spec_documents().iter().enumerate().fold(ScriptedModel::new(), |model, (i, doc)| {
        if i == 1 {
            model.fail("service unavailable")
        } else {
            model.respond(format!("customized {}", doc.file_name))
        }
    });

    let report = initialize_project(&project.layout(), &catalog, &model, &request(TemplateSource::Placeholders, false))
        .await
        .unwrap();

    assert_eq!(report.generated_count(), 6);
    let fallback: Vec<_> = report.fallbacks().collect();
    assert_eq!(fallback.len(), 1);
    assert!(matches!(&fallback[0].status, DocumentStatus::Fallback { error } if error.contains("service unavailable")));
    let notice = std::fs::read_to_string(project.layout().spec_dir().join(&fallback[0].file_name)).unwrap();
    assert!(notice.contains("Manual Action Required"));
}

#[tokio::test]
async fn existing_state_requires_force() {
    let project = TempProject::new();
    project.write_file(".stepgen/outputs/step1_output.md", "old");
    let catalog = StepCatalog::default();

    let err = initialize_project(
        &project.layout(),
        &catalog,
        &ScriptedModel::new(),
        &request(TemplateSource::Placeholders, false),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, InitError::AlreadyInitialized { .. }));
    assert_eq!(project.read_file(".stepgen/outputs/step1_output.md").as_deref(), Some("old"));

    let model = scripted_for_all_documents(&catalog);
    initialize_project(&project.layout(), &catalog, &model, &request(TemplateSource::Placeholders, true))
        .await
        .unwrap();
    assert!(project.read_file(".stepgen/outputs/step1_output.md").is_none());
}

#[tokio::test]
async fn fatal_write_error_removes_state_directory() {
    let project = TempProject::new();
    let layout = project.layout();
    // "../outputs" resolves to the outputs directory, which cannot be written
    // as a file.
    let catalog = StepCatalog::from_entries([("../outputs", "Collides", "collide")]);
    let model = ScriptedModel::new().respond("content");

    let err = initialize_project(&layout, &catalog, &model, &request(TemplateSource::Placeholders, false))
        .await
        .unwrap_err();

    assert!(matches!(err, InitError::Io { action: "write", .. }), "got {err}");
    assert!(!layout.state_dir().exists());
}
