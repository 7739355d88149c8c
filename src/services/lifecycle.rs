use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus};

pub struct CreateAppointment {
    pub client_id: String,
    pub barber_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
}

/// Create a new appointment in `pending` state.
///
/// Validates the references, the booking time against the barber's working
/// hours, and re-checks overlap against every non-cancelled appointment of
/// the barber inside the same transaction as the insert. The caller holds
/// the connection lock for the whole call, so no concurrent create can
/// slip between the check and the write; the partial unique index on
/// (barber, date, start_time) backstops exact-slot duplicates regardless.
pub fn create(
    conn: &Connection,
    req: &CreateAppointment,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let barber = queries::get_barber(conn, &req.barber_id)
        .map_err(AppError::storage)?
        .filter(|b| b.active)
        .ok_or_else(|| AppError::NotFound(format!("barber {}", req.barber_id)))?;

    let service = queries::get_service(conn, &req.service_id)
        .map_err(AppError::storage)?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::NotFound(format!("service {}", req.service_id)))?;

    queries::get_client(conn, &req.client_id)
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::NotFound(format!("client {}", req.client_id)))?;

    let starts_at = req.date.and_time(req.start_time);
    if starts_at <= now {
        return Err(AppError::InvalidSlot(
            "requested time is in the past".to_string(),
        ));
    }

    if !barber
        .working_hours
        .covers(req.date, req.start_time, service.duration_minutes)
    {
        return Err(AppError::InvalidSlot(format!(
            "outside working hours. Available: {}",
            barber.working_hours.to_human_readable()
        )));
    }

    let tx = conn.unchecked_transaction()?;

    let existing = queries::appointments_for_barber_on(&tx, &req.barber_id, req.date)
        .map_err(AppError::storage)?;
    if existing
        .iter()
        .any(|apt| apt.overlaps(req.start_time, service.duration_minutes))
    {
        return Err(AppError::SlotConflict);
    }

    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: req.client_id.clone(),
        barber_id: req.barber_id.clone(),
        service_id: req.service_id.clone(),
        service_name: service.name.clone(),
        price_cents: service.price_cents,
        duration_minutes: service.duration_minutes,
        date: req.date,
        start_time: req.start_time,
        status: AppointmentStatus::Pending,
        notes: req.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    queries::insert_appointment(&tx, &appointment).map_err(AppError::storage)?;
    tx.commit()?;

    Ok(appointment)
}

/// Move an appointment to `target`, enforcing the status machine.
///
/// Cancellations are only accepted until the scheduled start. The UPDATE is
/// conditional on the status the row was read in, so a concurrent change is
/// reported instead of overwritten.
pub fn transition(
    conn: &Connection,
    id: &str,
    target: AppointmentStatus,
    now: NaiveDateTime,
) -> Result<Appointment, AppError> {
    let mut appointment = queries::get_appointment(conn, id)
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    if !appointment.status.can_transition_to(target) {
        return Err(AppError::InvalidTransition {
            from: appointment.status,
            to: target,
        });
    }

    if target == AppointmentStatus::Cancelled && appointment.starts_at() <= now {
        return Err(AppError::TooLateToCancel);
    }

    let updated = queries::update_appointment_status(conn, id, appointment.status, target, now)
        .map_err(AppError::storage)?;
    if !updated {
        let current = queries::get_appointment(conn, id)
            .map_err(AppError::storage)?
            .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;
        return Err(AppError::InvalidTransition {
            from: current.status,
            to: target,
        });
    }

    appointment.status = target;
    appointment.updated_at = now;
    Ok(appointment)
}
