use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Barber {
    pub id: String,
    pub name: String,
    pub email: String,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub active: bool,
    pub working_hours: WorkingHours,
}

/// One weekly availability window, e.g. `{"day":"mon","start":"09:00","end":"17:00"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursWindow {
    pub day: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub windows: Vec<HoursWindow>,
}

impl WorkingHours {
    pub fn empty() -> Self {
        Self { windows: vec![] }
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: WorkingHours = serde_json::from_str(s)?;
        for window in &hours.windows {
            parse_weekday(&window.day)?;
            let start = parse_time(&window.start)?;
            let end = parse_time(&window.end)?;
            anyhow::ensure!(
                start < end,
                "window must start before it ends: {}-{}",
                window.start,
                window.end
            );
        }
        Ok(hours)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"windows":[]}"#.to_string())
    }

    /// Parsed windows for one weekday, ordered by start time.
    pub fn windows_for(&self, weekday: Weekday) -> Vec<(NaiveTime, NaiveTime)> {
        let key = weekday_key(weekday);
        let mut windows: Vec<(NaiveTime, NaiveTime)> = self
            .windows
            .iter()
            .filter(|w| w.day.to_lowercase() == key)
            .filter_map(|w| {
                let start = parse_time(&w.start).ok()?;
                let end = parse_time(&w.end).ok()?;
                Some((start, end))
            })
            .collect();
        windows.sort_by_key(|(start, _)| *start);
        windows
    }

    /// True when `[start, start+duration)` fits entirely inside one window on `date`.
    pub fn covers(&self, date: NaiveDate, start: NaiveTime, duration_minutes: i32) -> bool {
        let end = start + chrono::Duration::minutes(duration_minutes as i64);
        // An interval running past midnight never fits a same-day window.
        if end < start {
            return false;
        }
        self.windows_for(weekday_of(date))
            .iter()
            .any(|(w_start, w_end)| start >= *w_start && end <= *w_end)
    }

    pub fn to_human_readable(&self) -> String {
        if self.windows.is_empty() {
            return String::new();
        }

        let day_order = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

        let mut sorted = self.windows.clone();
        sorted.sort_by_key(|w| {
            day_order
                .iter()
                .position(|d| *d == w.day.to_lowercase())
                .unwrap_or(7)
        });

        sorted
            .iter()
            .map(|w| format!("{}: {}-{}", capitalize(&w.day), w.start, w.end))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn weekday_of(date: NaiveDate) -> Weekday {
    use chrono::Datelike;
    date.weekday()
}

fn weekday_key(weekday: Weekday) -> String {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
    .to_string()
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    match s.to_lowercase().as_str() {
        "mon" | "tue" | "wed" | "thu" | "fri" | "sat" | "sun" => Ok(()),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| anyhow::anyhow!("invalid time format: {s}"))
}
