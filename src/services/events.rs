use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::Appointment;

/// Pushed to connected barber panels whenever the schedule changes.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentEvent {
    pub kind: &'static str,
    pub appointment_id: String,
    pub barber_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub status: String,
}

impl AppointmentEvent {
    pub fn created(apt: &Appointment) -> Self {
        Self::new("created", apt)
    }

    pub fn status_changed(apt: &Appointment) -> Self {
        Self::new("status_changed", apt)
    }

    fn new(kind: &'static str, apt: &Appointment) -> Self {
        Self {
            kind,
            appointment_id: apt.id.clone(),
            barber_id: apt.barber_id.clone(),
            date: apt.date,
            start_time: apt.start_time,
            status: apt.status.as_str().to_string(),
        }
    }
}

/// Fire and forget: a send only fails when nobody is listening.
pub fn publish(tx: &broadcast::Sender<AppointmentEvent>, event: AppointmentEvent) {
    let _ = tx.send(event);
}
