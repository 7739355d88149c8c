use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::require_session;
use crate::handlers::{parse_date, parse_time};
use crate::models::client::normalize_phone;
use crate::models::{Appointment, AppointmentStatus};
use crate::services::booking::{self, BookingRequest};
use crate::services::events::{self, AppointmentEvent};
use crate::services::lifecycle;
use crate::services::reporting::{self, AppointmentFilter, ViewKind};
use crate::state::AppState;

// POST /api/appointments
#[derive(Deserialize)]
pub struct CreateRequest {
    pub client_name: String,
    pub client_phone: String,
    pub barber_id: String,
    pub service_id: String,
    pub date: String,
    pub start_time: String,
    pub notes: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let name = body.client_name.trim();
    let phone = normalize_phone(&body.client_phone);
    if name.is_empty() || phone.is_empty() {
        return Err(AppError::BadRequest(
            "client name and phone are required".to_string(),
        ));
    }

    let request = BookingRequest {
        client_name: name.to_string(),
        client_phone: phone,
        barber_id: body.barber_id.clone(),
        service_id: body.service_id.clone(),
        date: parse_date(&body.date)?,
        start_time: parse_time(&body.start_time)?,
        notes: body.notes.clone().filter(|n| !n.trim().is_empty()),
    };

    let appointment = {
        let db = state.db.lock().unwrap();
        booking::book(
            &db,
            &request,
            state.config.booking_window_days,
            Utc::now().naive_utc(),
        )?
    };

    tracing::info!(
        appointment_id = %appointment.id,
        barber_id = %appointment.barber_id,
        date = %appointment.date,
        start = %appointment.start_time,
        "appointment booked"
    );
    events::publish(&state.events_tx, AppointmentEvent::created(&appointment));

    Ok((StatusCode::CREATED, Json(appointment)))
}

// GET /api/appointments
#[derive(Deserialize)]
pub struct ListQuery {
    pub phone: Option<String>,
    pub barber_id: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub view: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<queries::AppointmentView>>, AppError> {
    // Clients list their own history by phone; anything broader needs a
    // barber session scoped to that barber's rows.
    let (client_phone, barber_id) = match &query.phone {
        Some(phone) => (Some(normalize_phone(phone)), query.barber_id.clone()),
        None => {
            let session = require_session(&headers, &state)?;
            match &query.barber_id {
                Some(id) if *id != session.barber_id => return Err(AppError::Unauthorized),
                _ => {}
            }
            (None, Some(session.barber_id))
        }
    };

    let date = query.date.as_deref().map(parse_date).transpose()?;
    let status = match query.status.as_deref() {
        Some(s) => Some(
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status: {s}")))?,
        ),
        None => None,
    };
    let view = match query.view.as_deref() {
        Some(v) => {
            ViewKind::parse(v).ok_or_else(|| AppError::BadRequest(format!("unknown view: {v}")))?
        }
        None => ViewKind::Upcoming,
    };
    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let views = {
        let db = state.db.lock().unwrap();
        reporting::list(
            &db,
            &AppointmentFilter {
                client_phone,
                barber_id,
                date,
                status,
            },
            view,
            limit,
        )?
    };
    Ok(Json(views))
}

// GET /api/appointments/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = {
        let db = state.db.lock().unwrap();
        queries::get_appointment(&db, &id).map_err(AppError::storage)?
    }
    .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    Ok(Json(appointment))
}

// PATCH /api/appointments/:id
#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: String,
}

pub async fn transition(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<Appointment>, AppError> {
    let target = AppointmentStatus::parse(&body.status)
        .ok_or_else(|| AppError::BadRequest(format!("unknown status: {}", body.status)))?;

    let appointment = {
        let db = state.db.lock().unwrap();

        // Cancellation is open to the client who booked; confirming and
        // completing belong to the barber behind the chair.
        if target != AppointmentStatus::Cancelled {
            let session = require_session(&headers, &state)?;
            let current = queries::get_appointment(&db, &id)
                .map_err(AppError::storage)?
                .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;
            if current.barber_id != session.barber_id {
                return Err(AppError::Unauthorized);
            }
        }

        lifecycle::transition(&db, &id, target, Utc::now().naive_utc())?
    };

    tracing::info!(
        appointment_id = %appointment.id,
        status = %appointment.status,
        "appointment status changed"
    );
    events::publish(
        &state.events_tx,
        AppointmentEvent::status_changed(&appointment),
    );

    Ok(Json(appointment))
}
