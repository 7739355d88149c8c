pub mod appointments;
pub mod auth;
pub mod availability;
pub mod barbers;
pub mod catalog;
pub mod events;
pub mod health;

use chrono::{NaiveDate, NaiveTime};

use crate::errors::AppError;

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {s}")))
}

pub(crate) fn parse_time(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| AppError::BadRequest(format!("invalid time: {s}")))
}
