//! HTTP request handlers

use super::types::{
    ActionResponse, AuditLogResponse, ErrorResponse, PermissionCheckResponse, RecentQuery,
    SeedRequest, SeedResponse, SessionListResponse, SessionResponse, UserListResponse,
    UserResponse, MAX_SEED_COUNT,
};
use super::AppState;
use crate::audit::{AuditFilter, RequestContext};
use crate::runtime::WorkflowError;
use crate::state_machine::{Action, NewSession};
use crate::trust::{self, User};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{self, Header, UserAgent};
use axum_extra::TypedHeader;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Sessions
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/seed", post(seed_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/action", post(apply_action))
        .route("/api/sessions/:id/history", get(session_history))
        // Audit
        .route("/api/audit", get(query_audit))
        .route("/api/audit/recent", get(recent_audit))
        .route("/api/audit/export", get(export_audit))
        // Users
        .route("/api/users", get(list_users))
        .route("/api/users/:id", get(get_user))
        .route("/api/users/:id/history", get(user_history))
        .route("/api/users/:id/permissions/:action", get(check_permission))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Identity
// ============================================================

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// `X-User-Id`: the staff member issuing the request
#[derive(Debug, Clone)]
pub struct ActingUser(pub String);

impl Header for ActingUser {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let id = value.to_str().map_err(|_| headers::Error::invalid())?.trim();
        if id.is_empty() {
            return Err(headers::Error::invalid());
        }
        Ok(ActingUser(id.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

fn authenticate(state: &AppState, acting: Option<TypedHeader<ActingUser>>) -> Result<User, AppError> {
    let TypedHeader(ActingUser(id)) = acting.ok_or(AppError::Unauthenticated)?;
    state
        .runtime
        .users()
        .get(&id)
        .cloned()
        .ok_or(AppError::UnknownUser(id))
}

fn request_context(user_agent: Option<TypedHeader<UserAgent>>, headers: &HeaderMap) -> RequestContext {
    let ip_address = headers
        .get(&X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);

    RequestContext {
        ip_address,
        user_agent: user_agent.map(|TypedHeader(ua)| ua.as_str().to_string()),
    }
}

// ============================================================
// Sessions
// ============================================================

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, AppError> {
    let sessions = state.runtime.sessions().await?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<NewSession>, JsonRejection>,
) -> Result<Json<ActionResponse>, AppError> {
    let Json(request) = payload?;
    let session = state.runtime.create_session(request).await?;
    Ok(Json(ActionResponse { ok: true, session }))
}

async fn seed_sessions(
    State(state): State<AppState>,
    payload: Result<Json<SeedRequest>, JsonRejection>,
) -> Result<Json<SeedResponse>, AppError> {
    // A bare POST seeds with defaults; a body must be valid JSON
    let request = match payload {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => SeedRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    if request.count > MAX_SEED_COUNT {
        return Err(AppError::BadRequest(format!(
            "count must be at most {MAX_SEED_COUNT}"
        )));
    }
    let total = state
        .runtime
        .seed_sessions(request.count, request.reset)
        .await?;
    Ok(Json(SeedResponse { ok: true, total }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.runtime.session(&id).await?;
    Ok(Json(SessionResponse { session }))
}

async fn apply_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    acting: Option<TypedHeader<ActingUser>>,
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
    payload: Result<Json<Action>, JsonRejection>,
) -> Result<Json<ActionResponse>, AppError> {
    let user = authenticate(&state, acting)?;
    let Json(action) = payload?;
    let context = request_context(user_agent, &headers);

    let session = state
        .runtime
        .dispatch(&user, &id, &action, &context)
        .await?;

    Ok(Json(ActionResponse { ok: true, session }))
}

async fn session_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AuditLogResponse>, AppError> {
    // 404 for unknown sessions rather than an empty list
    state.runtime.session(&id).await?;
    let logs = state.runtime.session_history(&id).await?;
    Ok(Json(AuditLogResponse { logs }))
}

// ============================================================
// Audit
// ============================================================

async fn query_audit(
    State(state): State<AppState>,
    query: Result<Query<AuditFilter>, QueryRejection>,
) -> Result<Json<AuditLogResponse>, AppError> {
    let Query(filter) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let logs = state.runtime.audit_log(&filter).await?;
    Ok(Json(AuditLogResponse { logs }))
}

async fn recent_audit(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<AuditLogResponse>, AppError> {
    let Query(RecentQuery { limit }) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let logs = state.runtime.recent_actions(limit).await?;
    Ok(Json(AuditLogResponse { logs }))
}

async fn export_audit(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state.runtime.export_audit().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

// ============================================================
// Users
// ============================================================

async fn list_users(State(state): State<AppState>) -> Json<UserListResponse> {
    Json(UserListResponse {
        users: state.runtime.users().all().to_vec(),
    })
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .runtime
        .users()
        .get(&id)
        .cloned()
        .ok_or(AppError::UnknownUser(id))?;
    let allowed_actions = trust::allowed_actions(&user, state.runtime.options().enforce_trust);
    Ok(Json(UserResponse {
        user,
        allowed_actions,
    }))
}

async fn user_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AuditLogResponse>, AppError> {
    let logs = state.runtime.user_history(&id).await?;
    Ok(Json(AuditLogResponse { logs }))
}

async fn check_permission(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<PermissionCheckResponse>, AppError> {
    let user = state
        .runtime
        .users()
        .get(&id)
        .ok_or_else(|| AppError::UnknownUser(id.clone()))?;
    let allowed = trust::can_perform_action_named(user, &action);
    Ok(Json(PermissionCheckResponse { action, allowed }))
}

async fn get_version() -> &'static str {
    concat!("fire-sessions ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    Workflow(WorkflowError),
    BadRequest(String),
    Unauthenticated,
    UnknownUser(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Workflow(e) => {
                let status = match &e {
                    WorkflowError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                    WorkflowError::Transition(t) => match t {
                        crate::state_machine::TransitionError::ActionNotAllowed { .. } => {
                            StatusCode::CONFLICT
                        }
                        _ => StatusCode::UNPROCESSABLE_ENTITY,
                    },
                    WorkflowError::Trust(_) => StatusCode::FORBIDDEN,
                    WorkflowError::Store(err) => {
                        tracing::error!(error = %err, "Storage failure");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.code(), e.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Missing X-User-Id header".to_string(),
            ),
            AppError::UnknownUser(id) => (
                StatusCode::UNAUTHORIZED,
                "UNKNOWN_USER",
                format!("Unknown user: {id}"),
            ),
        };

        let body = Json(ErrorResponse::new(code, message));
        (status, body).into_response()
    }
}
