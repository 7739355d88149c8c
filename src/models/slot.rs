use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A derived bookable window. Slots are computed by the availability engine
/// and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub barber_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
}

impl Slot {
    pub fn end_time(&self) -> NaiveTime {
        self.start_time + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}
