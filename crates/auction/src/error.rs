//! Fehlertypen fuer das Auktions-Crate

use thiserror::Error;

use bidcast_db::DbError;

/// Auktions-Fehlertypen
#[derive(Debug, Error)]
pub enum AuktionError {
    /// Gebot unter dem aktuellen Minimum
    #[error("Gebot zu niedrig, Minimum ist {minimum}")]
    GebotZuNiedrig { minimum: i64 },

    /// Unbekannter Bieter, unbekanntes Produkt oder Produkt in falschem Zustand
    #[error("Validierung fehlgeschlagen: {0}")]
    Validierung(String),

    /// Auktion oder Produkt existiert nicht
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Fehler aus dem Store
    #[error("Store-Fehler: {0}")]
    Datenbank(#[from] DbError),
}

impl AuktionError {
    pub fn validierung(msg: impl Into<String>) -> Self {
        Self::Validierung(msg.into())
    }

    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }
}
