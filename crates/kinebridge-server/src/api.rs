//! REST handlers.
//!
//! All error bodies are `{"error": "<message>"}` except the publish failure,
//! which keeps the `{"status":"error","message":...}` shape the browser
//! client expects.

use std::sync::Arc;

use axum::Json;
use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kinebridge_store::{MotionColumns, StoreError, SubjectInfo};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

use crate::state::AppState;

/// Topic the behaviour engine listens on for transition commands.
pub const TRANSITION_TOPIC: &str = "/flexbe/command/transition";

/// Service that receives the recording name and output directory.
pub const SET_NAME_AND_PATH_SERVICE: &str = "/ik/set_name_and_path";

/// Longest `topic` / `message` accepted by `/publish/`.
pub const MAX_PUBLISH_FIELD_LEN: usize = 200;

const BUS_FAILURE: &str = "Failed to connect to rosbridge";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    BadGateway(String),

    /// Bus unreachable while publishing a transition.
    #[error("{0}")]
    Bus(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Bus(message) => json!({"status": "error", "message": message}),
            other => json!({"error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidName(_)
            | StoreError::AlreadyExists(_)
            | StoreError::MissingColumns(_) => ApiError::BadRequest(e.to_string()),
            StoreError::NotFound(_)
            | StoreError::DirectoryMissing(_)
            | StoreError::FileNotFound(_) => ApiError::NotFound(e.to_string()),
            StoreError::Io(_) | StoreError::Json(_) => {
                error!(error = %e, "storage failure");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// [`Json`] body extractor whose rejections are `400 {"error": …}` rather
/// than axum's plain-text responses.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

fn require<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
}

/// One 400 listing every field flagged as absent.
fn missing_fields(fields: &[(&str, bool)]) -> ApiError {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();
    ApiError::BadRequest(format!("Missing required fields: {}", missing.join(", ")))
}

/// Text field coercion for `/publish/`: numbers become their string form,
/// surrounding whitespace is trimmed, and blank or over-long values are
/// rejected.  `Ok(None)` means the field is absent.
fn text_field(value: Option<Value>, field: &str, max_len: usize) -> ApiResult<Option<String>> {
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(ApiError::BadRequest(format!("{field}: Not a valid string."))),
    };
    if text.is_empty() {
        return Err(ApiError::BadRequest(format!("{field}: This field may not be blank.")));
    }
    if text.chars().count() > max_len {
        return Err(ApiError::BadRequest(format!(
            "{field}: Ensure this field has no more than {max_len} characters."
        )));
    }
    Ok(Some(text))
}

fn created(body: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(body))
}

// ─── Request bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateProject {
    pub project_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubject {
    pub subject_id: Option<String>,
    pub weight: Option<Value>,
    pub height: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSession {
    pub session_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatafile {
    pub datafile_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileDataRequest {
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub topic: Option<Value>,
    pub message: Option<Value>,
    #[serde(rename = "branchValue")]
    pub branch_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SetNameAndPathRequest {
    pub filename: Option<String>,
    pub filepath: Option<String>,
    #[serde(rename = "relativePath")]
    pub relative_path: Option<String>,
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn list_projects(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({"projects": state.projects.list_projects()?})))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CreateProject>,
) -> ApiResult<impl IntoResponse> {
    let name = require(body.project_name, "project_name")?;
    state.projects.create_project(&name)?;
    Ok(created(json!({"status": "success", "project_name": name})))
}

pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({"subjects": state.projects.list_subjects(&project)?})))
}

pub async fn create_subject(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
    JsonBody(body): JsonBody<CreateSubject>,
) -> ApiResult<impl IntoResponse> {
    let weight = body.weight.filter(|v| !v.is_null());
    let height = body.height.filter(|v| !v.is_null());
    let info = match (body.subject_id, weight, height) {
        (Some(id), Some(weight), Some(height)) => SubjectInfo::new(id, weight, height),
        (id, weight, height) => {
            return Err(missing_fields(&[
                ("subject_id", id.is_none()),
                ("weight", weight.is_none()),
                ("height", height.is_none()),
            ]));
        }
    };
    state.projects.create_subject(&project, &info)?;
    Ok(created(json!({"status": "success", "subject_id": info.subject_id})))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path((project, subject)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({"sessions": state.projects.list_sessions(&project, &subject)?})))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Path((project, subject)): Path<(String, String)>,
    JsonBody(body): JsonBody<CreateSession>,
) -> ApiResult<impl IntoResponse> {
    let name = require(body.session_name, "session_name")?;
    state.projects.create_session(&project, &subject, &name)?;
    Ok(created(json!({"status": "success", "session_name": name})))
}

pub async fn list_datafiles(
    State(state): State<Arc<AppState>>,
    Path((project, subject, session)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let datafiles = state.projects.list_datafiles(&project, &subject, &session)?;
    Ok(Json(json!({"datafiles": datafiles})))
}

pub async fn create_datafile(
    State(state): State<Arc<AppState>>,
    Path((project, subject, session)): Path<(String, String, String)>,
    JsonBody(body): JsonBody<CreateDatafile>,
) -> ApiResult<impl IntoResponse> {
    let name = require(body.datafile_name, "datafile_name")?;
    state
        .projects
        .create_datafile(&project, &subject, &session, &name)?;
    Ok(created(json!({"status": "success", "datafile_name": name})))
}

pub async fn get_filenames(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.motion.list_filenames()?))
}

pub async fn get_file_data(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult<Json<MotionColumns>> {
    Ok(Json(state.motion.read_columns(&filename)?))
}

pub async fn post_file_data(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<FileDataRequest>,
) -> ApiResult<Json<MotionColumns>> {
    let filename = require(body.filename, "filename")?;
    Ok(Json(state.motion.read_columns(&filename)?))
}

/// Publish a behaviour transition: `{"outcome": branchValue, "target": message}`.
pub async fn publish_topic(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<PublishRequest>,
) -> ApiResult<Json<Value>> {
    let topic = text_field(body.topic, "topic", MAX_PUBLISH_FIELD_LEN)?;
    let message = text_field(body.message, "message", MAX_PUBLISH_FIELD_LEN)?;
    let branch_value = body.branch_value.filter(|v| !v.is_null());
    let (topic, message, branch_value) = match (topic, message, branch_value) {
        (Some(topic), Some(message), Some(branch)) => (topic, message, branch),
        (topic, message, branch) => {
            return Err(missing_fields(&[
                ("topic", topic.is_none()),
                ("message", message.is_none()),
                ("branchValue", branch.is_none()),
            ]));
        }
    };

    let msg = json!({"outcome": branch_value, "target": message});
    if let Err(e) = state.commands.publish(TRANSITION_TOPIC, msg).await {
        warn!(error = %e, topic = %TRANSITION_TOPIC, "transition publish failed");
        return Err(ApiError::Bus(BUS_FAILURE.to_string()));
    }
    Ok(Json(json!({"status": "success", "topic": topic, "message": message})))
}

/// Create the recording directory, then hand its name and path to the
/// inverse-kinematics service.
pub async fn set_name_and_path(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<SetNameAndPathRequest>,
) -> ApiResult<Json<Value>> {
    let (filename, filepath, relative_path) =
        match (body.filename, body.filepath, body.relative_path) {
            (Some(name), Some(path), Some(relative)) => (name, path, relative),
            (name, path, relative) => {
                return Err(missing_fields(&[
                    ("filename", name.is_none()),
                    ("filepath", path.is_none()),
                    ("relativePath", relative.is_none()),
                ]));
            }
        };

    state.projects.ensure_relative_dir(&relative_path)?;

    let args = json!({"name": filename, "path": filepath});
    if let Err(e) = state
        .commands
        .call_service(SET_NAME_AND_PATH_SERVICE, args)
        .await
    {
        warn!(error = %e, service = %SET_NAME_AND_PATH_SERVICE, "service call failed");
        return Err(ApiError::Internal(BUS_FAILURE.to_string()));
    }
    Ok(Json(json!({"status": "success", "filename": filename, "filepath": filepath})))
}
