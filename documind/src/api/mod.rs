//! HTTP API layer exposing the knowledge engine.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::sse::{self, Sse},
    routing::{delete, get, post, put},
    Json, Router,
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use crate::generate::GenerationClient;
use documind_core::activity::{ActivityKind, ActivityLog};
use documind_core::directory::Directory;
use documind_core::error::EngineError;
use documind_core::events::{Event, EventBus};
use documind_core::files::FileStorage;
use documind_core::model::{Document, FolderScope, Message, Role, User};
use documind_core::selection::ContextMode;
use documind_core::session::{ChatSession, SessionStore};
use documind_core::store::Catalog;
use documind_core::visibility::{self, AccessView};

/// All engine state behind one lock. Mutations are synchronous, sequential
/// updates; only the byte transfer and the generation call run outside it.
pub struct Hub {
    pub directory: Directory,
    pub catalog: Catalog,
    pub sessions: SessionStore,
    pub activity: ActivityLog,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            directory: Directory::new(),
            catalog: Catalog::new(),
            sessions: SessionStore::new(),
            activity: ActivityLog::new(),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RwLock<Hub>>,
    pub storage: Arc<dyn FileStorage>,
    pub generator: Arc<GenerationClient>,
    pub events: EventBus,
}

/// Authenticated caller, resolved from the `X-User-Id` header against the
/// user directory.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user: User,
}

fn authenticate(hub: &Hub, headers: &HeaderMap) -> Option<User> {
    let id = headers.get("X-User-Id")?.to_str().ok()?;
    let id = Uuid::parse_str(id).ok()?;
    hub.directory.user(id).cloned()
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let hub = state.hub.read().await;
        authenticate(&hub, &parts.headers)
            .map(|user| AuthContext { user })
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

fn status_of(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Forbidden => StatusCode::FORBIDDEN,
        EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EngineError::ScopeMismatch => StatusCode::BAD_REQUEST,
        EngineError::TransferFailed(_)
        | EngineError::Generation { .. }
        | EngineError::Timeout { .. } => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Deserialize)]
struct RegisterUserRequest {
    name: String,
    role: Role,
    department_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct DepartmentRequest {
    name: String,
}

#[derive(Serialize)]
struct DepartmentResponse {
    id: Uuid,
    name: String,
}

#[derive(Deserialize)]
struct UploadRequest {
    name: String,
    folder_id: Option<Uuid>,
    department_id: Option<Uuid>,
    /// When set, the uploaded document is attached to this session's
    /// selection and remembered as a session-local upload.
    session_id: Option<Uuid>,
    data_base64: String,
}

#[derive(Deserialize)]
struct DecisionRequest {
    approve: bool,
}

#[derive(Deserialize)]
struct GrantRequest {
    user_id: Uuid,
}

#[derive(Deserialize)]
struct FolderRequest {
    name: String,
    parent_id: Option<Uuid>,
    department_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct SessionRequest {
    title: String,
    #[serde(default)]
    initial_doc_ids: Vec<Uuid>,
}

#[derive(Serialize)]
struct SessionSummary {
    id: Uuid,
    title: String,
    message_count: usize,
    last_updated: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SelectionOp {
    ToggleDocument { id: Uuid },
    ToggleFolder { id: Uuid },
    SelectAll,
    DeselectAll,
    SetMode { mode: ContextMode },
}

#[derive(Serialize)]
struct SelectionResponse {
    selected_doc_ids: Vec<Uuid>,
    selected_folder_ids: Vec<Uuid>,
    mode: ContextMode,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    generation_failed: bool,
}

pub fn router(
    hub: Arc<RwLock<Hub>>,
    storage: Arc<dyn FileStorage>,
    generator: Arc<GenerationClient>,
    events: EventBus,
) -> Router {
    let state = AppState {
        hub,
        storage,
        generator,
        events,
    };
    Router::new()
        .route("/users", post(register_user))
        .route("/departments", post(create_department).get(list_departments))
        .route("/files", post(upload_file))
        .route("/files/{id}", delete(delete_file))
        .route("/files/{id}/decision", post(decide_file))
        .route("/files/{id}/trash", put(trash_file))
        .route("/files/{id}/restore", put(restore_file))
        .route("/files/{id}/grant", post(grant_file))
        .route("/folders", post(create_folder).get(list_folders))
        .route("/library", get(get_library))
        .route("/trash", get(get_trash))
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/selection", post(update_selection))
        .route("/sessions/{id}/ask", post(ask))
        .route("/activity", get(get_activity))
        .route("/events", get(event_stream))
        .with_state(state)
}

/// Live change feed. Events are filtered per subscriber through the same
/// resolver as the library view, so nothing leaks that the caller could not
/// list anyway.
async fn event_stream(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>>> {
    let rx = state.events.subscribe();
    let hub = state.hub.clone();
    let user = auth.user;
    let stream = BroadcastStream::new(rx).filter_map(move |res| {
        let hub = hub.clone();
        let user = user.clone();
        async move {
            match res {
                Ok(evt) => {
                    let visible = {
                        let hub = hub.read().await;
                        let view = visibility::resolve(&user, &hub.catalog);
                        match &evt {
                            Event::FolderCreated { id } => view.folder_ids().contains(id),
                            Event::Uploaded { id }
                            | Event::Approved { id }
                            | Event::Rejected { id }
                            | Event::Trashed { id }
                            | Event::Restored { id }
                            | Event::Removed { id } => view.contains_document(*id),
                        }
                    };
                    if visible {
                        let data = serde_json::to_string(&evt).ok()?;
                        Some(Ok(sse::Event::default().data(data)))
                    } else {
                        None
                    }
                }
                Err(_) => None,
            }
        }
    });
    Sse::new(stream)
}

/// Register a user. Open until the first admin exists (bootstrap), admin-only
/// afterwards.
async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterUserRequest>,
) -> Result<Json<User>, StatusCode> {
    let mut hub = state.hub.write().await;
    if hub.directory.has_admin() {
        let caller = authenticate(&hub, &headers).ok_or(StatusCode::UNAUTHORIZED)?;
        if !caller.is_admin() {
            return Err(StatusCode::FORBIDDEN);
        }
    }
    let id = hub
        .directory
        .register_user(req.name, req.role, req.department_id)
        .map_err(|e| status_of(&e))?;
    let user = hub.directory.user(id).cloned().ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(user))
}

async fn create_department(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<DepartmentRequest>,
) -> Result<Json<DepartmentResponse>, StatusCode> {
    if !auth.user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    let mut hub = state.hub.write().await;
    let id = hub.directory.create_department(req.name.clone());
    Ok(Json(DepartmentResponse { id, name: req.name }))
}

async fn list_departments(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Json<Vec<DepartmentResponse>> {
    let hub = state.hub.read().await;
    let mut deps: Vec<DepartmentResponse> = hub
        .directory
        .departments()
        .map(|d| DepartmentResponse {
            id: d.id,
            name: d.name.clone(),
        })
        .collect();
    deps.sort_by(|a, b| a.name.cmp(&b.name));
    Json(deps)
}

/// Two-phase upload: a placeholder record is created in `Uploading` before
/// the bytes move, then promoted in place on success or discarded without a
/// trace on failure. Each upload in a batch is independent.
async fn upload_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UploadRequest>,
) -> Result<Json<Document>, StatusCode> {
    let user = auth.user;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.data_base64)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    if let Some(dep) = req.department_id {
        if !user.is_admin() && user.department_id != Some(dep) {
            return Err(StatusCode::FORBIDDEN);
        }
    }

    let mut hub = state.hub.write().await;
    hub.catalog.ensure_personal_folder(&user);
    if let Some(fid) = req.folder_id {
        if hub.catalog.folder(fid).is_none() {
            return Err(StatusCode::NOT_FOUND);
        }
        let view = visibility::resolve(&user, &hub.catalog);
        if !view.folder_ids().contains(&fid) {
            return Err(StatusCode::FORBIDDEN);
        }
    }

    let id = hub
        .catalog
        .begin_upload(
            &user,
            req.name.clone(),
            bytes.len() as u64,
            req.folder_id,
            req.department_id,
        )
        .map_err(|e| status_of(&e))?;

    // phase two: the transfer itself. The lock is held across it so no other
    // transition can interleave on this id between the phases.
    if let Err(err) = state.storage.upload(&req.name, &bytes).await {
        hub.catalog.fail_upload(id);
        warn!(name = %req.name, %err, "upload transfer failed");
        return Err(status_of(&EngineError::TransferFailed(err.to_string())));
    }
    hub.catalog
        .complete_upload(&user, id)
        .map_err(|e| status_of(&e))?;

    hub.activity
        .record(user.id, ActivityKind::Upload, req.name.clone());
    state.events.send(Event::Uploaded { id });

    if let Some(session_id) = req.session_id {
        if let Ok(session) = hub.sessions.get(user.id, session_id) {
            let mut selection = session.selection();
            selection.record_session_upload(id);
            let _ = hub.sessions.snapshot_selection(user.id, session_id, &selection);
        }
    }

    let doc = hub
        .catalog
        .document(id)
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(doc))
}

async fn decide_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = state.hub.write().await;
    hub.catalog
        .decide(&auth.user, id, req.approve)
        .map_err(|e| status_of(&e))?;
    state.events.send(if req.approve {
        Event::Approved { id }
    } else {
        Event::Rejected { id }
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn trash_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = state.hub.write().await;
    hub.catalog
        .set_deleted(&auth.user, id, true)
        .map_err(|e| status_of(&e))?;
    state.events.send(Event::Trashed { id });
    Ok(StatusCode::NO_CONTENT)
}

async fn restore_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = state.hub.write().await;
    hub.catalog
        .set_deleted(&auth.user, id, false)
        .map_err(|e| status_of(&e))?;
    state.events.send(Event::Restored { id });
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut hub = state.hub.write().await;
    let doc = hub
        .catalog
        .remove(&auth.user, id)
        .map_err(|e| status_of(&e))?;
    if let Err(err) = state.storage.delete_permanently(&doc.name).await {
        // the record is gone either way; the orphaned bytes are logged
        warn!(name = %doc.name, %err, "stored bytes could not be removed");
    }
    state.events.send(Event::Removed { id });
    Ok(StatusCode::NO_CONTENT)
}

async fn grant_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<GrantRequest>,
) -> Result<StatusCode, StatusCode> {
    if !auth.user.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    let mut hub = state.hub.write().await;
    if hub.catalog.document(id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    hub.directory
        .grant_document(req.user_id, id)
        .map_err(|e| status_of(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_folder(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<FolderRequest>,
) -> Result<Json<documind_core::model::Folder>, StatusCode> {
    let user = auth.user;
    let mut hub = state.hub.write().await;
    hub.catalog.ensure_personal_folder(&user);

    let scope = if let Some(pid) = req.parent_id {
        let parent = hub.catalog.folder(pid).ok_or(StatusCode::NOT_FOUND)?;
        match parent.scope {
            FolderScope::Personal(owner) if owner != user.id => {
                return Err(StatusCode::FORBIDDEN)
            }
            FolderScope::Department(dep)
                if !user.is_admin() && user.department_id != Some(dep) =>
            {
                return Err(StatusCode::FORBIDDEN)
            }
            scope => scope,
        }
    } else if let Some(dep) = req.department_id {
        if !user.is_admin() && user.department_id != Some(dep) {
            return Err(StatusCode::FORBIDDEN);
        }
        FolderScope::Department(dep)
    } else if let Some(dep) = user.department_id {
        FolderScope::Department(dep)
    } else {
        FolderScope::Personal(user.id)
    };

    let id = hub
        .catalog
        .create_folder(req.name.clone(), req.parent_id, scope)
        .map_err(|e| status_of(&e))?;
    hub.activity
        .record(user.id, ActivityKind::FolderCreated, req.name);
    state.events.send(Event::FolderCreated { id });
    let folder = hub
        .catalog
        .folder(id)
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(folder))
}

async fn list_folders(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Json<Vec<documind_core::model::Folder>> {
    let mut hub = state.hub.write().await;
    hub.catalog.ensure_personal_folder(&auth.user);
    let view = visibility::resolve(&auth.user, &hub.catalog);
    Json(view.folders)
}

/// Resolved folders and accessible documents for the caller.
async fn get_library(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Json<AccessView> {
    let mut hub = state.hub.write().await;
    hub.catalog.ensure_personal_folder(&auth.user);
    Json(visibility::resolve(&auth.user, &hub.catalog))
}

async fn get_trash(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Json<Vec<Document>> {
    let hub = state.hub.read().await;
    Json(visibility::trash(&auth.user, &hub.catalog))
}

async fn create_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<SessionRequest>,
) -> Result<Json<ChatSession>, StatusCode> {
    let user = auth.user;
    let mut hub = state.hub.write().await;
    hub.catalog.ensure_personal_folder(&user);
    let view = visibility::resolve(&user, &hub.catalog);
    // callers should filter already; drop anything outside the accessible set
    let initial: Vec<Uuid> = req
        .initial_doc_ids
        .into_iter()
        .filter(|id| view.contains_document(*id))
        .collect();
    let id = hub.sessions.create(user.id, req.title, &initial);
    let session = hub
        .sessions
        .get(user.id, id)
        .map_err(|e| status_of(&e))?
        .clone();
    Ok(Json(session))
}

async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Json<Vec<SessionSummary>> {
    let hub = state.hub.read().await;
    let summaries = hub
        .sessions
        .list(auth.user.id)
        .into_iter()
        .map(|s| SessionSummary {
            id: s.id,
            title: s.title.clone(),
            message_count: s.messages.len(),
            last_updated: s.last_updated,
        })
        .collect();
    Json(summaries)
}

async fn get_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatSession>, StatusCode> {
    let hub = state.hub.read().await;
    let session = hub
        .sessions
        .get(auth.user.id, id)
        .map_err(|e| status_of(&e))?
        .clone();
    Ok(Json(session))
}

/// Apply one selection operation. The stored selection is revalidated against
/// the current resolver output before the operation, so stale ids from
/// concurrent approvals or deletions are dropped silently.
async fn update_selection(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(op): Json<SelectionOp>,
) -> Result<Json<SelectionResponse>, StatusCode> {
    let user = auth.user;
    let mut hub = state.hub.write().await;
    hub.catalog.ensure_personal_folder(&user);
    let view = visibility::resolve(&user, &hub.catalog);
    let mut selection = hub
        .sessions
        .get(user.id, id)
        .map_err(|e| status_of(&e))?
        .selection();
    selection.revalidate(&view);

    match op {
        SelectionOp::ToggleDocument { id } => selection.toggle_document(id, &view),
        SelectionOp::ToggleFolder { id } => selection.toggle_folder(id, &view),
        SelectionOp::SelectAll => selection.select_all(&view),
        SelectionOp::DeselectAll => selection.deselect_all(),
        SelectionOp::SetMode { mode } => selection.set_mode(mode),
    }

    hub.sessions
        .snapshot_selection(user.id, id, &selection)
        .map_err(|e| status_of(&e))?;

    let mut selected_doc_ids: Vec<Uuid> = selection.doc_ids().iter().copied().collect();
    selected_doc_ids.sort();
    let mut selected_folder_ids: Vec<Uuid> = selection.folder_ids().iter().copied().collect();
    selected_folder_ids.sort();
    Ok(Json(SelectionResponse {
        selected_doc_ids,
        selected_folder_ids,
        mode: selection.mode(),
    }))
}

/// Send a question. The selection is resolved to document names under the
/// lock; the generation call runs outside it since it can take minutes. A
/// generation failure becomes an assistant-role error message and the session
/// stays usable.
async fn ask(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, StatusCode> {
    let user = auth.user;
    let file_names = {
        let mut hub = state.hub.write().await;
        hub.catalog.ensure_personal_folder(&user);
        let view = visibility::resolve(&user, &hub.catalog);
        let mut selection = hub
            .sessions
            .get(user.id, id)
            .map_err(|e| status_of(&e))?
            .selection();
        selection.revalidate(&view);
        let names = selection.resolve_for_query(&view);
        hub.sessions
            .append_message(user.id, id, Message::user(req.question.clone()))
            .map_err(|e| status_of(&e))?;
        hub.sessions
            .snapshot_selection(user.id, id, &selection)
            .map_err(|e| status_of(&e))?;
        names
    };

    let result = state.generator.generate(&req.question, &file_names).await;
    let (content, generation_failed) = match result {
        Ok(answer) => (answer, false),
        Err(err) => {
            let (partial, message) = match err {
                EngineError::Generation { partial, message } => (partial, message),
                EngineError::Timeout { partial, secs } => {
                    (partial, format!("timed out after {secs}s"))
                }
                other => (String::new(), other.to_string()),
            };
            let content = if partial.is_empty() {
                format!("[generation error] {message}")
            } else {
                // whatever streamed before the failure is kept and shown
                format!("{partial}\n\n[generation error] {message}")
            };
            (content, true)
        }
    };

    let mut hub = state.hub.write().await;
    hub.sessions
        .append_message(user.id, id, Message::assistant(content.clone()))
        .map_err(|e| status_of(&e))?;
    Ok(Json(AskResponse {
        answer: content,
        generation_failed,
    }))
}

async fn get_activity(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Json<Vec<documind_core::activity::ActivityEntry>> {
    let hub = state.hub.read().await;
    Json(hub.activity.recent(50).into_iter().cloned().collect())
}
