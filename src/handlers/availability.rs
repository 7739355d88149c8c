use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::parse_date;
use crate::models::Slot;
use crate::services::availability::find_free_slots;
use crate::state::AppState;

// GET /api/availability?barber_id&date&service_id
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub barber_id: String,
    pub date: String,
    pub service_id: Option<String>,
}

pub async fn free_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let date = parse_date(&query.date)?;

    let db = state.db.lock().unwrap();

    let barber = queries::get_barber(&db, &query.barber_id)
        .map_err(AppError::storage)?
        .filter(|b| b.active)
        .ok_or_else(|| AppError::NotFound(format!("barber {}", query.barber_id)))?;

    // Slot spacing is fixed by configuration; the service only sets how much
    // time a booking would consume from the chosen start.
    let duration = match &query.service_id {
        Some(service_id) => {
            queries::get_service(&db, service_id)
                .map_err(AppError::storage)?
                .filter(|s| s.active)
                .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?
                .duration_minutes
        }
        None => state.config.slot_granularity_minutes as i32,
    };

    let slots = find_free_slots(
        &db,
        &barber,
        date,
        duration,
        state.config.slot_granularity_minutes,
        Utc::now().naive_utc(),
    )?;

    Ok(Json(slots))
}
