use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, patch, post},
};
use std::{collections::HashMap, sync::Arc};
use parking_lot::RwLock;
use tokio::task::AbortHandle;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    catalog::{catalog, Catalog},
    config::AppConfig,
    error::{ApiError, ApiResult},
    gemini::{GenerationError, ImageGenerator},
    gemini::GENERIC_FAILURE,
    intake::{check_media_type, decode_data_url, ingest, ingest_data_url, IncomingFile, IntakeError},
    models::{AssetSlot, ConfigUpdate, DataUrlUpload, GenerationResult, SessionView, UploadedFile},
    wizard::{GenerationJob, GenerationOutcome, GenerationTicket, Studio, UploadOutcome, UploadTicket},
};

/// One user's studio plus the handle of its running generation, if any.
#[derive(Default)]
pub struct Session {
    pub studio: Studio,
    generation: Option<AbortHandle>,
}

impl Session {
    fn abort_generation(&mut self) {
        if let Some(handle) = self.generation.take() {
            tracing::info!("🛑 Aborting in-flight generation");
            handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub generator: Arc<dyn ImageGenerator>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(generator: Arc<dyn ImageGenerator>, config: AppConfig) -> Self {
        Self { sessions: Arc::default(), generator, config: Arc::new(config) }
    }

    fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> ApiResult<T>) -> ApiResult<T> {
        let mut guard = self.sessions.write();
        let session = guard.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
        f(session)
    }

    fn view(&self, id: Uuid) -> ApiResult<Json<SessionView>> {
        self.with_session(id, |s| Ok(Json(s.studio.session_view(id))))
    }
}

/// Upload requests carry either raw bytes or a base64 data URL, so the limit
/// leaves room for base64 growth plus form overhead.
fn request_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes / 3 * 4 + 64 * 1024
}

pub fn router(state: AppState) -> Router {
    let body_limit = request_body_limit(state.config.max_upload_bytes);
    Router::new()
        .route("/api/catalog", get(get_catalog))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/wizard", post(start_wizard))
        .route("/api/sessions/:id/config", patch(update_config))
        .route(
            "/api/sessions/:id/uploads/:slot",
            post(upload_file).put(upload_data_url).get(get_upload).delete(clear_upload),
        )
        .route("/api/sessions/:id/next", post(next_step))
        .route("/api/sessions/:id/back", post(previous_step))
        .route("/api/sessions/:id/generate", post(generate))
        .route("/api/sessions/:id/regenerate", post(regenerate))
        .route("/api/sessions/:id/create-another", post(create_another))
        .route("/api/sessions/:id/dashboard", post(back_to_dashboard))
        .route("/api/sessions/:id/result", get(get_result))
        .route("/api/sessions/:id/result/download", get(download_result))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn get_catalog() -> Json<Catalog> {
    Json(catalog())
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let id = Uuid::new_v4();
    let session = Session::default();
    let view = session.studio.session_view(id);
    state.sessions.write().insert(id, session);
    tracing::info!("🎯 Created studio session {}", id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.view(id)
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<StatusCode> {
    let mut session = state.sessions.write().remove(&id).ok_or(ApiError::SessionNotFound(id))?;
    session.abort_generation();
    tracing::info!("Ended studio session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_wizard(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        tracing::info!("Opening a new wizard for session {} from {:?}", id, s.studio.view_kind());
        if s.studio.start_wizard() {
            s.abort_generation();
        }
        Ok(Json(s.studio.session_view(id)))
    })
}

pub async fn update_config(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ConfigUpdate>,
) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        s.studio.wizard_mut()?.update_config(body)?;
        Ok(Json(s.studio.session_view(id)))
    })
}

fn begin_upload(state: &AppState, id: Uuid, slot: AssetSlot) -> ApiResult<UploadTicket> {
    state.with_session(id, |s| Ok(s.studio.wizard_mut()?.begin_upload(slot)))
}

fn finish_upload(
    state: &AppState,
    id: Uuid,
    ticket: UploadTicket,
    read: Result<UploadedFile, IntakeError>,
) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        let outcome = match s.studio.wizard_mut() {
            Ok(wizard) => wizard.complete_upload(ticket, read),
            Err(_) => UploadOutcome::Stale,
        };
        match outcome {
            UploadOutcome::Accepted => {
                tracing::info!("✅ Stored {} image for session {}", ticket.slot(), id);
                Ok(Json(s.studio.session_view(id)))
            }
            UploadOutcome::Rejected(e) => Err(ApiError::Intake(e)),
            UploadOutcome::Stale => Err(ApiError::StaleSelection),
        }
    })
}

/// File-picker path: `multipart/form-data` with a `file` field.
pub async fn upload_file(
    Path((id, slot)): Path<(Uuid, AssetSlot)>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SessionView>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let media_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        // A non-image selection is turned away without touching the slot.
        check_media_type(&media_type)?;

        let ticket = begin_upload(&state, id, slot)?;
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
        return finish_upload(&state, id, ticket, ingest(IncomingFile { file_name, media_type, bytes }));
    }
    Err(ApiError::BadRequest("missing 'file' field".into()))
}

/// Drag-and-drop path: the browser sends the file already read as a data URL.
pub async fn upload_data_url(
    Path((id, slot)): Path<(Uuid, AssetSlot)>,
    State(state): State<AppState>,
    Json(body): Json<DataUrlUpload>,
) -> ApiResult<Json<SessionView>> {
    let read = ingest_data_url(&body.data_url, body.file_name);
    if let Err(e @ IntakeError::InvalidFileType(_)) = read {
        return Err(e.into());
    }
    let ticket = begin_upload(&state, id, slot)?;
    finish_upload(&state, id, ticket, read)
}

pub async fn get_upload(
    Path((id, slot)): Path<(Uuid, AssetSlot)>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let preview_url = state.with_session(id, |s| {
        let wizard = s.studio.wizard()?;
        wizard.upload(slot).map(|f| f.preview_url.clone()).ok_or(ApiError::NoUpload(slot))
    })?;
    let (media_type, bytes) = decode_data_url(&preview_url).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, media_type)], bytes))
}

pub async fn clear_upload(
    Path((id, slot)): Path<(Uuid, AssetSlot)>,
    State(state): State<AppState>,
) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        s.studio.wizard_mut()?.clear_upload(slot);
        Ok(Json(s.studio.session_view(id)))
    })
}

pub async fn next_step(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        let step = s.studio.wizard_mut()?.next()?;
        tracing::info!("Session {} moved to step {}", id, step.ordinal());
        Ok(Json(s.studio.session_view(id)))
    })
}

pub async fn previous_step(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        let step = s.studio.wizard_mut()?.back()?;
        tracing::info!("Session {} moved back to step {}", id, step.ordinal());
        Ok(Json(s.studio.session_view(id)))
    })
}

/// Applies a finished remote call to the session; `None` when the session is gone.
fn complete_generation(
    state: &AppState,
    id: Uuid,
    ticket: GenerationTicket,
    prompt: String,
    outcome: Result<String, GenerationError>,
) -> Option<(GenerationOutcome, SessionView)> {
    let mut guard = state.sessions.write();
    let session = guard.get_mut(&id)?;
    let outcome = session.studio.finish_generation(ticket, prompt, state.generator.model(), outcome);
    // A discarded completion must not drop the handle of a newer generation.
    if outcome != GenerationOutcome::Discarded {
        session.generation = None;
    }
    Some((outcome, session.studio.session_view(id)))
}

/// Runs one generation. The remote call lives in its own task that writes its
/// result back to the session, so a dropped request cannot leave the wizard
/// loading; navigating away aborts the task.
pub async fn generate(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    let (ticket, task) = state.with_session(id, |s| {
        let GenerationJob { ticket, request } = s.studio.begin_generation()?;
        tracing::info!("🚀 Generating design for session {} (prompt: {} chars)", id, request.prompt.len());

        let task_state = state.clone();
        let task = tokio::spawn(async move {
            let timeout = task_state.config.generation_timeout;
            let outcome = match tokio::time::timeout(timeout, task_state.generator.generate(&request)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!("⏱️ Generation for session {} timed out after {:?}", id, timeout);
                    Err(GenerationError::TimedOut(timeout))
                }
            };
            complete_generation(&task_state, id, ticket, request.prompt, outcome)
        });
        // The task needs this lock to finish, so the handle is in place before it can complete.
        s.generation = Some(task.abort_handle());
        Ok((ticket, task))
    })?;

    let completed = match task.await {
        Ok(completed) => completed,
        Err(e) if e.is_cancelled() => return Err(ApiError::Cancelled),
        Err(e) => {
            // The task died before writing back, so the loading state is released here.
            tracing::error!("💥 Generation task for session {} panicked: {}", id, e);
            let failure = Err(GenerationError::Remote(GENERIC_FAILURE.to_string()));
            complete_generation(&state, id, ticket, String::new(), failure)
        }
    };

    match completed {
        Some((GenerationOutcome::Discarded, _)) => Err(ApiError::Cancelled),
        Some((outcome, view)) => {
            if let GenerationOutcome::Failed(message) = &outcome {
                tracing::warn!("Generation for session {} failed: {}", id, message);
            }
            Ok(Json(view))
        }
        None => Err(ApiError::SessionNotFound(id)),
    }
}

pub async fn regenerate(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        s.studio.regenerate()?;
        let step = s.studio.wizard()?.step();
        tracing::info!("🔁 Session {} regenerating from step {}", id, step.ordinal());
        Ok(Json(s.studio.session_view(id)))
    })
}

pub async fn create_another(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        s.studio.create_another()?;
        Ok(Json(s.studio.session_view(id)))
    })
}

pub async fn back_to_dashboard(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.with_session(id, |s| {
        if s.studio.back_to_dashboard() {
            s.abort_generation();
        }
        Ok(Json(s.studio.session_view(id)))
    })
}

fn current_result(state: &AppState, id: Uuid) -> ApiResult<GenerationResult> {
    state.with_session(id, |s| s.studio.result().cloned().ok_or(ApiError::NoResult))
}

pub async fn get_result(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<GenerationResult>> {
    current_result(&state, id).map(Json)
}

pub async fn download_result(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let result = current_result(&state, id)?;
    let (_, bytes) = decode_data_url(&result.image_url).map_err(|e| ApiError::Internal(e.to_string()))?;
    let headers = [
        (header::CONTENT_TYPE, "image/png".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", result.download_file_name())),
    ];
    Ok((headers, bytes))
}
