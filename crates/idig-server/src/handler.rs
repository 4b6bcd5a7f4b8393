use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use idig_repo::{SurveyVersion, TrenchRepository};
use idig_store::FsStore;
use idig_survey::Survey;
use idig_sync::{sync, AccessPolicy, SyncRequest, SyncResponse};
use idig_types::TrenchVersion;

use crate::auth::{basic_credentials, FileAccessPolicy};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const USERS_FILE: &str = "users.txt";

#[derive(Debug, Serialize)]
pub struct TrenchInfo {
    pub project: String,
    pub name: String,
    pub version: String,
    pub last_modified: DateTime<Utc>,
    pub read_only: bool,
}

#[derive(Debug, Serialize)]
pub struct ListTrenchesResponse {
    pub trenches: Vec<TrenchInfo>,
}

#[derive(Debug, Serialize)]
pub struct ReadSurveysResponse {
    pub version: String,
    pub surveys: Vec<Survey>,
}

/// GET /idig — every trench the principal can access, across all projects.
pub async fn list_trenches(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ListTrenchesResponse>> {
    let (user, password) = credentials(&headers)?;

    let mut trenches = Vec::new();
    for entry in std::fs::read_dir(&state.config.root_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(project) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if project.starts_with('.') {
            continue;
        }
        // A directory is a project iff it has a users file; the principal
        // only sees projects it can authenticate against.
        let Ok(policy) = FileAccessPolicy::load(&entry.path().join(USERS_FILE)) else {
            continue;
        };
        if !policy.authenticate(&user, &password) {
            continue;
        }

        for trench_entry in std::fs::read_dir(entry.path())? {
            let trench_entry = trench_entry?;
            if !trench_entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = trench_entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || !trench_entry.path().join("objects").is_dir() {
                continue;
            }
            let Ok(repo) = TrenchRepository::open(&trench_entry.path(), &user, &name) else {
                continue;
            };
            let Ok(Some(version)) = repo.version() else {
                // Empty trenches have no version to report yet.
                continue;
            };
            trenches.push(TrenchInfo {
                project: project.clone(),
                version: version.version.to_hex(),
                last_modified: version.date,
                read_only: !policy.can_write_trench(&user, &name),
                name,
            });
        }
    }
    Ok(Json(ListTrenchesResponse { trenches }))
}

/// POST /idig/{project}/{trench} — one sync protocol decision.
pub async fn sync_trench(
    State(state): State<Arc<AppState>>,
    Path((project, trench)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<SyncResponse>> {
    let (user, policy) = authorize(&state, &project, &headers)?;
    let request: SyncRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid sync request: {e}")))?;

    // The whole decision runs under the trench's commit lock so concurrent
    // writers against the same head serialize; the loser sees the winner's
    // head and gets a pull.
    let lock = state.locks.lock_for(&project, &trench);
    let _guard = lock.lock();

    let repo = open_trench(&state, &project, &trench, &user, &policy)?;
    let response = sync(&repo, &request)?;
    Ok(Json(response))
}

/// GET /idig/{project}/{trench}/attachments/{name}?checksum= — download.
pub async fn read_attachment(
    State(state): State<Arc<AppState>>,
    Path((project, trench, name)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let (user, policy) = authorize(&state, &project, &headers)?;
    let checksum = required_param(&params, "checksum")?;
    let repo = open_trench(&state, &project, &trench, &user, &policy)?;

    let data = repo.read_attachment(&name, checksum)?;
    tracing::debug!(%name, bytes = data.len(), "attachment read");
    Ok(([(header::CONTENT_TYPE, content_type_for(&name))], data).into_response())
}

/// PUT /idig/{project}/{trench}/attachments/{name}?checksum= — upload.
pub async fn write_attachment(
    State(state): State<Arc<AppState>>,
    Path((project, trench, name)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let (user, policy) = authorize(&state, &project, &headers)?;
    let checksum = required_param(&params, "checksum")?;
    let repo = open_trench(&state, &project, &trench, &user, &policy)?;

    repo.write_attachment(&name, checksum, &body)?;
    tracing::debug!(%name, bytes = body.len(), "attachment staged");
    Ok(StatusCode::OK)
}

/// GET /idig/{project}/{trench}/surveys?version= — snapshot at a version,
/// or at the head when no version is given. An empty trench reads as an
/// empty snapshot.
pub async fn read_surveys(
    State(state): State<Arc<AppState>>,
    Path((project, trench)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Json<ReadSurveysResponse>> {
    let (user, policy) = authorize(&state, &project, &headers)?;
    let repo = open_trench(&state, &project, &trench, &user, &policy)?;

    let response = match params.get("version").filter(|v| !v.is_empty()) {
        Some(version) => {
            let (id, _) = repo.resolve_version(version)?;
            ReadSurveysResponse {
                version: id.to_hex(),
                surveys: repo.read_surveys_at_version(version)?,
            }
        }
        None => match repo.head()? {
            Some(head) => ReadSurveysResponse {
                version: head.to_hex(),
                surveys: repo.read_surveys()?,
            },
            None => ReadSurveysResponse {
                version: String::new(),
                surveys: Vec::new(),
            },
        },
    };
    Ok(Json(response))
}

/// GET /idig/{project}/{trench}/surveys/{uuid}/versions — one survey's history.
pub async fn read_survey_versions(
    State(state): State<Arc<AppState>>,
    Path((project, trench, uuid)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<SurveyVersion>>> {
    let (user, policy) = authorize(&state, &project, &headers)?;
    let repo = open_trench(&state, &project, &trench, &user, &policy)?;
    Ok(Json(repo.read_all_survey_versions(&uuid)?))
}

/// GET /idig/{project}/{trench}/versions — commit history, newest first.
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path((project, trench)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<TrenchVersion>>> {
    let (user, policy) = authorize(&state, &project, &headers)?;
    let repo = open_trench(&state, &project, &trench, &user, &policy)?;
    Ok(Json(repo.list_versions()?))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn credentials(headers: &HeaderMap) -> ApiResult<(String, String)> {
    basic_credentials(headers)
        .ok_or_else(|| ApiError::NotAuthenticated("missing authorization header".into()))
}

fn authorize(
    state: &AppState,
    project: &str,
    headers: &HeaderMap,
) -> ApiResult<(String, FileAccessPolicy)> {
    let (user, password) = credentials(headers)?;
    validate_segment(project)?;
    let users_file = state.config.root_dir.join(project).join(USERS_FILE);
    let policy = FileAccessPolicy::load(&users_file)
        .map_err(|_| ApiError::NotAuthenticated("invalid username or password".into()))?;
    if !policy.authenticate(&user, &password) {
        return Err(ApiError::NotAuthenticated(
            "invalid username or password".into(),
        ));
    }
    tracing::info!(%project, %user, "authenticated");
    Ok((user, policy))
}

fn open_trench(
    state: &AppState,
    project: &str,
    trench: &str,
    user: &str,
    policy: &FileAccessPolicy,
) -> ApiResult<TrenchRepository<FsStore>> {
    validate_segment(trench)?;
    let dir = state.config.root_dir.join(project).join(trench);
    let read_only = !policy.can_write_trench(user, trench);
    Ok(TrenchRepository::open(&dir, user, trench)?.with_read_only(read_only))
}

fn required_param<'a>(params: &'a HashMap<String, String>, key: &str) -> ApiResult<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {key}")))
}

/// URL path segments must name a plain directory entry.
fn validate_segment(name: &str) -> ApiResult<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(ApiError::BadRequest(format!("invalid path segment {name:?}")));
    }
    Ok(())
}

/// Content type from the attachment's file extension.
fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
