use crate::builder::{BuilderAction, QuizBuilder};
use crate::error::AppError;
use crate::models::{QuizPayload, QuizRecord, Role, User};
use crate::session::{QuizSession, SessionAction, SessionView};
use crate::state::{AppState, UserSession};
use crate::store::{DashboardStats, ListQuery, QuizPage, QuizStore, SavedQuiz};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use validator::Validate;

const SESSION_COOKIE: &str = "quiz_session";
const CSRF_COOKIE: &str = "csrf_token";
static RATE_LIMIT: Lazy<DashMap<String, (u32, Instant)>> = Lazy::new(DashMap::new);

fn check_rate_limit(scope: &str, key: &str, limit_per_minute: u32) -> bool {
    let now = Instant::now();
    let full_key = format!("{scope}:{key}");
    if let Some(mut entry) = RATE_LIMIT.get_mut(&full_key) {
        if now.duration_since(entry.1) > Duration::from_secs(60) {
            *entry = (1, now);
            true
        } else if entry.0 >= limit_per_minute {
            false
        } else {
            entry.0 += 1;
            true
        }
    } else {
        RATE_LIMIT.insert(full_key, (1, now));
        true
    }
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn current_session(jar: &CookieJar, state: &AppState) -> Option<UserSession> {
    let sid = jar.get(SESSION_COOKIE)?.value();
    state.sessions.get(sid).map(|s| s.value().clone())
}

fn require_user(jar: &CookieJar, state: &AppState, req_id: &str) -> Result<UserSession, AppError> {
    current_session(jar, state).ok_or_else(|| AppError::unauthorized(req_id))
}

/// Signed-in admin whose `x-csrf-token` header matches the session.
fn require_admin(headers: &HeaderMap, jar: &CookieJar, state: &AppState, req_id: &str) -> Result<UserSession, AppError> {
    let session = require_user(jar, state, req_id)?;
    let header = headers.get("x-csrf-token").and_then(|h| h.to_str().ok());
    if header != Some(session.csrf_token.as_str()) {
        return Err(AppError::new(StatusCode::FORBIDDEN, "FORBIDDEN", "csrf token invalid", req_id));
    }
    if session.role != Role::Admin {
        return Err(AppError::new(StatusCode::FORBIDDEN, "FORBIDDEN", "admin access required", req_id));
    }
    Ok(session)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub profile_photo: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeOut {
    pub id: String,
    pub email: String,
    pub name: String,
    pub profile_photo: String,
    pub role: Role,
}

impl MeOut {
    fn new(user: User, role: Role) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            profile_photo: user.profile_photo,
            role,
        }
    }
}

/// Called once the identity provider has verified the profile.
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<SignInPayload>,
) -> Result<(CookieJar, Json<MeOut>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("local");
    if !check_rate_limit("auth_sign_in", ip, 30) {
        return Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "too many requests",
            req_id,
        ));
    }
    if payload.validate().is_err() || payload.name.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "invalid profile",
            req_id,
        ));
    }

    let user = state
        .store
        .upsert_user(&payload.email, payload.name.trim(), &payload.profile_photo)
        .await;
    let role = if state.config.is_admin(&user.email) { Role::Admin } else { Role::User };
    let (session_id, session) = state.open_session(&user.id, role);
    info!(user_id = %user.id, ?role, "signed in");

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    let csrf_cookie = Cookie::build((CSRF_COOKIE, session.csrf_token))
        .http_only(false)
        .same_site(SameSite::Lax)
        .path("/")
        .build();

    Ok((jar.add(cookie).add(csrf_cookie), Json(MeOut::new(user, role))))
}

pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    let req_id = request_id_from_headers(&headers);
    let sid = jar
        .get(SESSION_COOKIE)
        .map(|v| v.value().to_string())
        .ok_or_else(|| AppError::unauthorized(req_id))?;
    state.sessions.remove(&sid);
    Ok((
        jar.remove(Cookie::from(SESSION_COOKIE)).remove(Cookie::from(CSRF_COOKIE)),
        StatusCode::NO_CONTENT,
    ))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Json<MeOut>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_user(&jar, &state, &req_id)?;
    let user = state
        .store
        .get_user(&session.user_id)
        .await
        .ok_or_else(|| AppError::unauthorized(req_id))?;
    Ok(Json(MeOut::new(user, session.role)))
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub quiz: SavedQuiz,
}

impl From<SavedQuiz> for SaveResponse {
    fn from(quiz: SavedQuiz) -> Self {
        Self {
            message: quiz.message.clone(),
            quiz,
        }
    }
}

pub async fn list_quizzes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<QuizPage> {
    Json(state.store.list_quizzes(query).await)
}

pub async fn create_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<QuizPayload>,
) -> Result<(StatusCode, Json<SaveResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_admin(&headers, &jar, &state, &req_id)?;
    let saved = state
        .store
        .create_quiz(&session.user_id, payload)
        .await
        .map_err(|e| AppError::from_store(e, req_id))?;
    Ok((StatusCode::CREATED, Json(saved.into())))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<QuizRecord>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let quiz = state
        .store
        .get_quiz(&id)
        .await
        .map_err(|_| AppError::not_found("quiz", req_id))?;
    Ok(Json(quiz))
}

pub async fn update_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(payload): Json<QuizPayload>,
) -> Result<Json<SaveResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_admin(&headers, &jar, &state, &req_id)?;
    let saved = state
        .store
        .update_quiz(&session.user_id, &id, payload)
        .await
        .map_err(|e| AppError::from_store(e, req_id))?;
    Ok(Json(saved.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub message: &'static str,
    pub deleted_quiz: DeletedQuiz,
}

#[derive(Debug, Serialize)]
pub struct DeletedQuiz {
    pub id: String,
    pub title: String,
}

pub async fn delete_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_admin(&headers, &jar, &state, &req_id)?;
    let removed = state
        .store
        .delete_quiz(&session.user_id, &id)
        .await
        .map_err(|e| AppError::from_store(e, req_id))?;
    Ok(Json(DeleteResponse {
        message: "Quiz deleted successfully",
        deleted_quiz: DeletedQuiz {
            id: removed.id,
            title: removed.title,
        },
    }))
}

pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Json<DashboardStats>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_user(&jar, &state, &req_id)?;
    Ok(Json(state.store.dashboard(&session.user_id).await))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftPayload {
    #[serde(default)]
    pub quiz_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub draft_id: String,
    #[serde(flatten)]
    pub builder: QuizBuilder,
    pub draft_valid: bool,
}

impl DraftView {
    fn new(draft_id: String, builder: QuizBuilder) -> Self {
        Self {
            draft_valid: builder.draft().is_valid(),
            draft_id,
            builder,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DraftActionResponse {
    pub accepted: bool,
    pub draft: DraftView,
}

fn owned_draft(state: &AppState, session: &UserSession, id: &str, req_id: &str) -> Result<QuizBuilder, AppError> {
    let entry = state
        .drafts
        .get(id)
        .ok_or_else(|| AppError::not_found("draft", req_id))?;
    if entry.owner_id != session.user_id {
        return Err(AppError::not_found("draft", req_id));
    }
    Ok(entry.builder.clone())
}

pub async fn create_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<CreateDraftPayload>,
) -> Result<(StatusCode, Json<DraftView>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_admin(&headers, &jar, &state, &req_id)?;
    let builder = match payload.quiz_id {
        Some(quiz_id) => {
            let record = state
                .store
                .get_quiz(&quiz_id)
                .await
                .map_err(|e| AppError::from_store(e, req_id.clone()))?;
            if record.created_by != session.user_id {
                return Err(AppError::not_found("quiz", req_id));
            }
            QuizBuilder::for_quiz(&record)
        }
        None => QuizBuilder::new(),
    };
    let id = state.open_draft(&session.user_id, builder.clone());
    Ok((StatusCode::CREATED, Json(DraftView::new(id, builder))))
}

pub async fn get_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_user(&jar, &state, &req_id)?;
    let builder = owned_draft(&state, &session, &id, &req_id)?;
    Ok(Json(DraftView::new(id, builder)))
}

pub async fn draft_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(action): Json<BuilderAction>,
) -> Result<Json<DraftActionResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_admin(&headers, &jar, &state, &req_id)?;
    let mut entry = state
        .drafts
        .get_mut(&id)
        .ok_or_else(|| AppError::not_found("draft", &req_id))?;
    if entry.owner_id != session.user_id {
        return Err(AppError::not_found("draft", req_id));
    }
    entry.touched = Instant::now();
    let accepted = entry.builder.apply(action);
    let builder = entry.builder.clone();
    drop(entry);
    Ok(Json(DraftActionResponse {
        accepted,
        draft: DraftView::new(id, builder),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitDraftPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Saves the draft through the store. The draft is discarded only once the store
/// accepted it; any failure leaves it in place for another attempt.
pub async fn submit_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(payload): Json<SubmitDraftPayload>,
) -> Result<(StatusCode, Json<SaveResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let session = require_admin(&headers, &jar, &state, &req_id)?;
    let builder = owned_draft(&state, &session, &id, &req_id)?;
    let creating = builder.quiz_id().is_none();

    let saved = match builder
        .submit(state.store.as_ref(), &session.user_id, payload.title, payload.description)
        .await
    {
        Ok(saved) => saved,
        Err(err) => {
            warn!(draft_id = %id, "draft submit rejected: {}", err);
            return Err(AppError::from_store(err, req_id));
        }
    };
    state.drafts.remove(&id);
    let status = if creating { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(saved.into())))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub attempt_id: String,
    pub quiz_id: String,
    #[serde(flatten)]
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct AttemptActionResponse {
    pub accepted: bool,
    pub attempt: AttemptView,
}

pub async fn start_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(quiz_id): Path<String>,
) -> Result<(StatusCode, Json<AttemptView>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let quiz = state
        .store
        .get_quiz(&quiz_id)
        .await
        .map_err(|_| AppError::not_found("quiz", req_id))?;
    let session = QuizSession::new(quiz.questions);
    let view = session.view();
    let attempt_id = state.start_attempt(&quiz_id, session);
    Ok((
        StatusCode::CREATED,
        Json(AttemptView {
            attempt_id,
            quiz_id,
            session: view,
        }),
    ))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AttemptView>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let entry = state
        .attempts
        .get(&id)
        .ok_or_else(|| AppError::not_found("attempt", req_id))?;
    Ok(Json(AttemptView {
        quiz_id: entry.quiz_id.clone(),
        session: entry.session.view(),
        attempt_id: id,
    }))
}

pub async fn attempt_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(action): Json<SessionAction>,
) -> Result<Json<AttemptActionResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let mut entry = state
        .attempts
        .get_mut(&id)
        .ok_or_else(|| AppError::not_found("attempt", req_id))?;
    entry.touched = Instant::now();
    let accepted = entry.session.apply(action);
    let attempt = AttemptView {
        quiz_id: entry.quiz_id.clone(),
        session: entry.session.view(),
        attempt_id: id,
    };
    drop(entry);
    Ok(Json(AttemptActionResponse { accepted, attempt }))
}
