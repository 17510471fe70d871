//! SQLite-Implementierung der Repository-Traits

pub mod auktionen;
pub mod benutzer;
pub mod chat;
pub mod gebote;
pub mod pool;
pub mod produkte;

pub use pool::SqliteDb;

use chrono::{DateTime, Utc};

/// Parst einen als Text gespeicherten Zeitstempel
///
/// SQLite liefert je nach Schreibweg RFC3339 oder das
/// strftime-Default-Format ohne Zeitzonen-Suffix.
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}
