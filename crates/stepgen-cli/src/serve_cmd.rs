use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use stepgen_core::model::Model;
use stepgen_core::pipeline::{StepError, StepOutcome, StepPipeline, StepRequest};
use stepgen_core::steps::StepCatalog;
use stepgen_core::template::DirTemplateProvider;
use stepgen_core::{OutputStore, ProjectLayout, StepId};

use crate::config::{self, CliOverrides, ConfigKeyError, ProjectConfig};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl From<ConfigKeyError> for AppError {
    fn from(err: ConfigKeyError) -> Self {
        match err {
            ConfigKeyError::Unknown(_) => Self::not_found(err.to_string()),
            ConfigKeyError::ReadOnly(_) | ConfigKeyError::InvalidValue { .. } => {
                Self::bad_request(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where handlers get their model from.
#[derive(Clone)]
pub enum ModelSource {
    /// Resolve from project config on every request, so `PUT
    /// /api/config/model.*` takes effect immediately.
    Configured(CliOverrides),
    Fixed(Arc<dyn Model>),
}

#[derive(Clone)]
pub struct AppState {
    layout: ProjectLayout,
    catalog: StepCatalog,
    models: ModelSource,
}

impl AppState {
    pub fn new(layout: ProjectLayout, models: ModelSource) -> Self {
        Self {
            layout,
            catalog: StepCatalog::default(),
            models,
        }
    }

    fn model_for(&self, project: &ProjectConfig) -> Result<Arc<dyn Model>, AppError> {
        match &self.models {
            ModelSource::Fixed(model) => Ok(Arc::clone(model)),
            ModelSource::Configured(overrides) => {
                let user = config::load_user_config();
                let spec = config::resolve_model_spec(
                    project.model.as_ref(),
                    user.as_ref().and_then(|u| u.model.as_ref()),
                    overrides,
                );
                let model = spec
                    .build()
                    .map_err(|e| AppError::internal(anyhow::Error::new(e).context("invalid model configuration")))?;
                Ok(Arc::new(model))
            }
        }
    }

    fn project(&self) -> Result<ProjectConfig, AppError> {
        config::load_config(&self.layout).map_err(AppError::internal)
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StepSummary {
    pub step: StepId,
    pub title: String,
    pub template_file: String,
    pub has_template: bool,
    pub has_output: bool,
    pub is_current: bool,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub apply: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetConfigBody {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigValueResponse {
    pub key: String,
    pub value: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/steps", get(list_steps))
        .route("/api/specs/{file}", get(get_spec))
        .route("/api/outputs/{step}", get(get_output))
        .route("/api/steps/{step}/generate", post(generate_step))
        .route("/api/config/{key}", get(get_config).put(put_config))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!("stepgen serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stepgen serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn step_summaries(state: &AppState, current: Option<StepId>) -> Vec<StepSummary> {
    let spec_dir = state.layout.spec_dir();
    state
        .catalog
        .steps()
        .iter()
        .map(|def| StepSummary {
            step: def.id,
            title: def.title.clone(),
            template_file: def.template_file.clone(),
            has_template: spec_dir.join(&def.template_file).is_file(),
            has_output: state.layout.output_path(def.id).is_file(),
            is_current: current == Some(def.id),
        })
        .collect()
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let current = state.project().ok().and_then(|p| p.current_step);
    let rows = step_summaries(&state, current)
        .iter()
        .map(|s| {
            let output = if s.has_output {
                format!("<a href=\"/api/outputs/{step}\">output</a>", step = s.step)
            } else {
                "-".to_string()
            };
            format!(
                "<tr><td>{step}{marker}</td><td><a href=\"/api/specs/{file}\">{title}</a></td><td>{output}</td></tr>",
                step = s.step,
                marker = if s.is_current { " (current)" } else { "" },
                file = s.template_file,
                title = s.title,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let html = format!(
        "<!DOCTYPE html>\
<html><head><title>stepgen</title></head><body>\
<h1>stepgen</h1>\
<p><a href=\"/api/steps\">/api/steps</a></p>\
<table><tr><th>Step</th><th>Template</th><th>Output</th></tr>{rows}</table>\
</body></html>"
    );

    Html(html)
}

async fn list_steps(State(state): State<AppState>) -> Result<Json<Vec<StepSummary>>, AppError> {
    let current = state.project()?.current_step;
    Ok(Json(step_summaries(&state, current)))
}

/// A spec file name must be a single plain file name.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

async fn get_spec(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Json<TextResponse>, AppError> {
    if !is_safe_file_name(&file) {
        return Err(AppError::bad_request(format!("invalid spec file name {file:?}")));
    }
    let path = state.layout.spec_dir().join(&file);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(Json(TextResponse { name: file, content })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::not_found(format!("spec file {file} not found")))
        }
        Err(e) => Err(AppError::internal(e.into())),
    }
}

fn parse_step(raw: &str, catalog: &StepCatalog) -> Result<StepId, AppError> {
    let step: StepId = raw.parse().map_err(|e| AppError::bad_request(format!("{e}")))?;
    if !catalog.contains(step) {
        return Err(AppError::not_found(format!("unknown step {step}")));
    }
    Ok(step)
}

async fn get_output(
    State(state): State<AppState>,
    Path(step): Path<String>,
) -> Result<Json<TextResponse>, AppError> {
    let step = parse_step(&step, &state.catalog)?;
    let store = state.layout.output_store();
    match store.load_output(step) {
        Ok(Some(content)) => Ok(Json(TextResponse {
            name: step.to_string(),
            content,
        })),
        Ok(None) => Err(AppError::not_found(format!("no output for {step}"))),
        Err(e) => Err(AppError::internal(e.into())),
    }
}

async fn generate_step(
    State(state): State<AppState>,
    Path(step): Path<String>,
    body: Option<Json<GenerateBody>>,
) -> Result<Json<StepOutcome>, AppError> {
    let step = parse_step(&step, &state.catalog)?;
    let apply = body.map(|Json(b)| b.apply).unwrap_or_default();
    let project = state.project()?;
    let model = state.model_for(&project)?;

    let store = state.layout.output_store();
    let templates = DirTemplateProvider::new(state.layout.spec_dir(), state.catalog.clone());
    let request = StepRequest {
        step,
        problem_description: Some(project.problem_description.clone()),
        project_root: state.layout.root().to_path_buf(),
        apply_enabled: apply,
    };

    let outcome = StepPipeline::new(&store, &templates, model.as_ref())
        .run(&request)
        .await
        .map_err(|e: StepError| AppError::bad_gateway(e.to_string()))?;

    config::record_current_step(&state.layout, step).map_err(AppError::internal)?;
    Ok(Json(outcome))
}

async fn get_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ConfigValueResponse>, AppError> {
    config::check_readable(&key)?;
    let project = state.project()?;
    let value = config::value_of(&project, &key);
    Ok(Json(ConfigValueResponse { key, value }))
}

async fn put_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SetConfigBody>,
) -> Result<Json<ConfigValueResponse>, AppError> {
    config::check_settable(&key).map_err(|e| AppError::bad_request(e.to_string()))?;
    // Fails with a clear message when the project is not initialized.
    state.project()?;
    config::set_value(&state.layout, &key, &body.value).map_err(|e| match e.downcast::<ConfigKeyError>() {
        Ok(key_err) => AppError::bad_request(key_err.to_string()),
        Err(other) => AppError::internal(other),
    })?;

    let value = config::value_of(&state.project()?, &key);
    Ok(Json(ConfigValueResponse { key, value }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use stepgen_core::ProjectLayout;
    use stepgen_core::model::ModelSpec;
    use stepgen_test_utils::{ScriptedModel, TempProject, actions_json, step};

    use super::{AppState, ModelSource};
    use crate::config::{self, ProjectConfig};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn init_project(project: &TempProject) -> ProjectLayout {
        let layout = project.layout();
        layout.ensure_dirs().unwrap();
        config::save_config(
            &layout,
            &ProjectConfig {
                problem_description: "A book club planner".to_string(),
                template_directory: None,
                current_step: None,
                initialized_at: None,
                model: Some(ModelSpec::default()),
            },
        )
        .unwrap();
        std::fs::write(layout.spec_dir().join("step1-problem-definition.md"), "# Problem\n").unwrap();
        layout
    }

    fn router(layout: ProjectLayout, model: ScriptedModel) -> axum::Router {
        super::build_router(AppState::new(layout, ModelSource::Fixed(Arc::new(model))))
    }

    async fn send(app: axum::Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> axum::response::Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.oneshot(request).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_index_returns_html() {
        let project = TempProject::new();
        let layout = init_project(&project);

        let resp = send(router(layout, ScriptedModel::new()), "GET", "/", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("text/html"), "got: {content_type}");
    }

    #[tokio::test]
    async fn test_list_steps_reports_presence() {
        let project = TempProject::new();
        let layout = init_project(&project);

        let resp = send(router(layout, ScriptedModel::new()), "GET", "/api/steps", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let steps = json.as_array().unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0]["step"], "step1");
        assert_eq!(steps[0]["has_template"], true);
        assert_eq!(steps[1]["has_template"], false);
        assert_eq!(steps[0]["has_output"], false);
    }

    #[tokio::test]
    async fn test_get_spec() {
        let project = TempProject::new();
        let layout = init_project(&project);

        let resp = send(
            router(layout.clone(), ScriptedModel::new()),
            "GET",
            "/api/specs/step1-problem-definition.md",
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["content"], "# Problem\n");

        let resp = send(router(layout.clone(), ScriptedModel::new()), "GET", "/api/specs/missing.md", None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(router(layout, ScriptedModel::new()), "GET", "/api/specs/..", None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_output_missing_and_invalid() {
        let project = TempProject::new();
        let layout = init_project(&project);

        let resp = send(router(layout.clone(), ScriptedModel::new()), "GET", "/api/outputs/step2", None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(body_json(resp).await["error"].as_str().unwrap().contains("step2"));

        let resp = send(router(layout, ScriptedModel::new()), "GET", "/api/outputs/banana", None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_step_runs_pipeline() {
        let project = TempProject::new();
        let layout = init_project(&project);
        let model = ScriptedModel::new().plan_then_actions(
            "Create the README",
            actions_json(&[("README.md", "create", "# Book club\n")]),
        );

        let resp = send(
            router(layout.clone(), model),
            "POST",
            "/api/steps/step1/generate",
            Some(serde_json::json!({ "apply": true })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["step"], "step1");
        assert_eq!(json["report"]["created"][0]["path"], "README.md");
        assert_eq!(project.read_file("README.md").as_deref(), Some("# Book club\n"));

        let config = config::load_config(&layout).unwrap();
        assert_eq!(config.current_step, Some(step(1)));

        let resp = send(router(layout, ScriptedModel::new()), "GET", "/api/outputs/step1", None).await;
        assert_eq!(body_json(resp).await["content"], "Create the README");
    }

    #[tokio::test]
    async fn test_generate_without_body_does_not_apply() {
        let project = TempProject::new();
        let layout = init_project(&project);
        let model = ScriptedModel::new()
            .plan_then_actions("plan", actions_json(&[("src/main.rs", "create", "fn main() {}\n")]));

        let resp = send(router(layout, model), "POST", "/api/steps/step1/generate", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["report"]["flagged"][0]["reason"], "apply disabled");
        assert!(project.read_file("src/main.rs").is_none());
    }

    #[tokio::test]
    async fn test_generation_failure_is_bad_gateway() {
        let project = TempProject::new();
        let layout = init_project(&project);
        let model = ScriptedModel::new().fail("upstream down");

        let resp = send(router(layout, model), "POST", "/api/steps/step1/generate", None).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(body_json(resp).await["error"].as_str().unwrap().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_config_get_and_put() {
        let project = TempProject::new();
        let layout = init_project(&project);

        let resp = send(router(layout.clone(), ScriptedModel::new()), "GET", "/api/config/model.provider", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["value"], "claude");

        let resp = send(
            router(layout.clone(), ScriptedModel::new()),
            "PUT",
            "/api/config/model.name",
            Some(serde_json::json!({ "value": "sonnet" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["value"], "sonnet");

        let resp = send(
            router(layout.clone(), ScriptedModel::new()),
            "PUT",
            "/api/config/problem_description",
            Some(serde_json::json!({ "value": "x" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(router(layout, ScriptedModel::new()), "GET", "/api/config/nope", None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
