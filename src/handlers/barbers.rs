use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::require_session;
use crate::handlers::parse_date;
use crate::models::{AppointmentStatus, Barber, WorkingHours};
use crate::services::reporting;
use crate::state::AppState;

// GET /api/barbers
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Barber>>, AppError> {
    let barbers = {
        let db = state.db.lock().unwrap();
        queries::list_barbers(&db).map_err(AppError::storage)?
    };
    Ok(Json(barbers))
}

// GET /api/barbers/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Barber>, AppError> {
    let barber = {
        let db = state.db.lock().unwrap();
        queries::get_barber(&db, &id).map_err(AppError::storage)?
    }
    .filter(|b| b.active)
    .ok_or_else(|| AppError::NotFound(format!("barber {id}")))?;

    Ok(Json(barber))
}

// PUT /api/barbers/:id/hours
pub async fn update_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = require_session(&headers, &state)?;
    if session.barber_id != id {
        return Err(AppError::Unauthorized);
    }

    // Round-trip through the validating parser so malformed windows never
    // reach the database.
    let hours = WorkingHours::from_json(&body.to_string())
        .map_err(|e| AppError::BadRequest(format!("invalid working hours: {e}")))?;

    let updated = {
        let db = state.db.lock().unwrap();
        queries::update_working_hours(&db, &id, &hours).map_err(AppError::storage)?
    };
    if !updated {
        return Err(AppError::NotFound(format!("barber {id}")));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/barbers/:id/appointments
#[derive(Deserialize)]
pub struct DayQuery {
    pub date: String,
    pub status: Option<String>,
}

pub async fn day(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<queries::AppointmentView>>, AppError> {
    let session = require_session(&headers, &state)?;
    if session.barber_id != id {
        return Err(AppError::Unauthorized);
    }

    let date = parse_date(&query.date)?;
    let status = match query.status.as_deref() {
        Some(s) => Some(
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status: {s}")))?,
        ),
        None => None,
    };

    let day = {
        let db = state.db.lock().unwrap();
        reporting::barber_day(&db, &id, date, status)?
    };
    Ok(Json(day))
}
