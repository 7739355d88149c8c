use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries::{self, AppointmentQuery, AppointmentView};
use crate::errors::AppError;
use crate::models::AppointmentStatus;

/// Upcoming views read forward in time, history views backward. Both order
/// by (date, start time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Upcoming,
    History,
}

impl ViewKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(ViewKind::Upcoming),
            "history" => Some(ViewKind::History),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter {
    pub client_phone: Option<String>,
    pub barber_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

pub fn list(
    conn: &Connection,
    filter: &AppointmentFilter,
    view: ViewKind,
    limit: i64,
) -> Result<Vec<AppointmentView>, AppError> {
    queries::list_appointments(
        conn,
        &AppointmentQuery {
            client_phone: filter.client_phone.clone(),
            barber_id: filter.barber_id.clone(),
            date: filter.date,
            status: filter.status,
            descending: view == ViewKind::History,
            limit,
        },
    )
    .map_err(AppError::storage)
}

/// One barber's agenda for one date, earliest first.
pub fn barber_day(
    conn: &Connection,
    barber_id: &str,
    date: NaiveDate,
    status: Option<AppointmentStatus>,
) -> Result<Vec<AppointmentView>, AppError> {
    list(
        conn,
        &AppointmentFilter {
            barber_id: Some(barber_id.to_string()),
            date: Some(date),
            status,
            ..Default::default()
        },
        ViewKind::Upcoming,
        200,
    )
}
