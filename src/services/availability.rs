use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{barber::weekday_of, Barber, Slot};

/// Compute the free slots of one barber on one date.
///
/// Candidate starts are aligned to `granularity_minutes` (counted from
/// midnight) and walked across each working-hour window of the weekday. A
/// candidate survives when the full `[start, start + duration)` interval fits
/// inside the window, lies in the future, and overlaps no non-cancelled
/// appointment of the barber on that date. Results are ascending by start
/// time. Pure read: nothing is written or reserved.
pub fn find_free_slots(
    conn: &Connection,
    barber: &Barber,
    date: NaiveDate,
    duration_minutes: i32,
    granularity_minutes: u32,
    now: NaiveDateTime,
) -> Result<Vec<Slot>, AppError> {
    if date < now.date() {
        return Err(AppError::InvalidSlot("date is in the past".to_string()));
    }
    if duration_minutes <= 0 {
        return Err(AppError::InvalidSlot(format!(
            "invalid duration: {duration_minutes}"
        )));
    }

    let windows = barber.working_hours.windows_for(weekday_of(date));
    if windows.is_empty() {
        return Ok(vec![]);
    }

    let booked =
        queries::appointments_for_barber_on(conn, &barber.id, date).map_err(AppError::storage)?;

    let step = chrono::Duration::minutes(granularity_minutes.max(1) as i64);
    let duration = chrono::Duration::minutes(duration_minutes as i64);

    let mut slots = vec![];
    for (window_start, window_end) in windows {
        let Some(mut cursor) = align_up(window_start, granularity_minutes.max(1)) else {
            continue;
        };
        loop {
            let end = cursor + duration;
            // `+` on NaiveTime wraps at midnight; a wrapped end means the
            // candidate ran off the end of the day.
            if end < cursor || end > window_end {
                break;
            }
            let in_past = date == now.date() && cursor <= now.time();
            let taken = booked.iter().any(|apt| apt.overlaps(cursor, duration_minutes));
            if !in_past && !taken {
                slots.push(Slot {
                    barber_id: barber.id.clone(),
                    date,
                    start_time: cursor,
                    duration_minutes,
                });
            }
            let next = cursor + step;
            if next <= cursor {
                break;
            }
            cursor = next;
        }
    }

    slots.sort_by_key(|s| s.start_time);
    Ok(slots)
}

/// Round a time up to the next multiple of `granularity_minutes` from
/// midnight. 09:00 stays 09:00 at 30 min; 09:10 becomes 09:30. None when the
/// rounding runs past the end of the day.
fn align_up(time: NaiveTime, granularity_minutes: u32) -> Option<NaiveTime> {
    let total = time.hour() * 60 + time.minute() + u32::from(time.second() > 0);
    let rem = total % granularity_minutes;
    let aligned = if rem == 0 {
        total
    } else {
        total + granularity_minutes - rem
    };
    NaiveTime::from_num_seconds_from_midnight_opt(aligned * 60, 0)
}
