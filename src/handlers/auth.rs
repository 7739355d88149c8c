use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Barber;
use crate::services::identity::{self, Session};
use crate::state::AppState;

/// Resolve the barber session from the Authorization header.
pub fn require_session(headers: &HeaderMap, state: &AppState) -> Result<Session, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or("");

    identity::validate_token(token, &state.config.session_secret, Utc::now().naive_utc())
        .ok_or(AppError::Unauthorized)
}

// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub barber: Barber,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest("email and password are required".to_string()));
    }

    let valid = state
        .identity
        .verify_credentials(&email, &body.password)
        .await
        .map_err(|e| AppError::Unavailable(format!("identity service: {e}")))?;
    if !valid {
        return Err(AppError::Unauthorized);
    }

    // Accepted credentials without a matching barber record get the same
    // answer as a bad password.
    let barber = {
        let db = state.db.lock().unwrap();
        queries::get_barber_by_email(&db, &email).map_err(AppError::storage)?
    }
    .filter(|b| b.active)
    .ok_or(AppError::Unauthorized)?;

    let now = Utc::now().naive_utc();
    let token = identity::issue_token(
        &barber.id,
        now,
        state.config.session_ttl_hours,
        &state.config.session_secret,
    );
    let expires_at = (now + chrono::Duration::hours(state.config.session_ttl_hours))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    tracing::info!(barber_id = %barber.id, "barber logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at,
        barber,
    }))
}

// GET /api/auth/session
#[derive(Serialize)]
pub struct SessionResponse {
    pub barber: Barber,
    pub expires_at: String,
}

pub async fn session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    let session = require_session(&headers, &state)?;

    let barber = {
        let db = state.db.lock().unwrap();
        queries::get_barber(&db, &session.barber_id).map_err(AppError::storage)?
    }
    .ok_or_else(|| AppError::NotFound(format!("barber {}", session.barber_id)))?;

    Ok(Json(SessionResponse {
        barber,
        expires_at: session.expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}
