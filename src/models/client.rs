use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub created_at: NaiveDateTime,
}

/// Canonical form of a phone number: digits plus an optional leading `+`.
/// Clients are keyed by this string, so "+54 11 5555-0001" and "+5411 55550001"
/// resolve to the same record.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() {
            normalized.push(c);
        } else if c == '+' && i == 0 {
            normalized.push(c);
        }
    }
    normalized
}
