use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::client::normalize_phone;
use crate::models::{Appointment, Client};
use crate::services::lifecycle::{self, CreateAppointment};

pub struct BookingRequest {
    pub client_name: String,
    pub client_phone: String,
    pub barber_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
}

/// Book a slot for a (possibly new) client.
///
/// Resolves the client by normalized phone, creating the record on first
/// contact and refreshing the stored name on repeat bookings, then hands
/// off to the lifecycle manager. Client resolution is idempotent, so a
/// failed create leaves no inconsistent state behind: the client row stays,
/// no appointment is written.
pub fn book(
    conn: &Connection,
    req: &BookingRequest,
    booking_window_days: u32,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let horizon = now.date() + chrono::Duration::days(booking_window_days as i64);
    if req.date > horizon {
        return Err(AppError::InvalidSlot(format!(
            "bookings are only accepted up to {booking_window_days} days ahead"
        )));
    }

    let client = resolve_client(conn, &req.client_name, &req.client_phone, now)?;

    lifecycle::create(
        conn,
        &CreateAppointment {
            client_id: client.id,
            barber_id: req.barber_id.clone(),
            service_id: req.service_id.clone(),
            date: req.date,
            start_time: req.start_time,
            notes: req.notes.clone(),
        },
        now,
    )
}

fn resolve_client(
    conn: &Connection,
    name: &str,
    phone: &str,
    now: NaiveDateTime,
) -> Result<Client, AppError> {
    let phone = normalize_phone(phone);

    if let Some(mut existing) =
        queries::find_client_by_phone(conn, &phone).map_err(AppError::storage)?
    {
        let name = name.trim();
        if !name.is_empty() && existing.name != name {
            queries::update_client_name(conn, &existing.id, name).map_err(AppError::storage)?;
            existing.name = name.to_string();
        }
        return Ok(existing);
    }

    let client = Client {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        phone,
        created_at: now,
    };
    queries::create_client(conn, &client).map_err(AppError::storage)?;
    Ok(client)
}
