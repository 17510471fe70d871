//! Fehlertypen fuer die Signaling-Schicht
//!
//! Die Handler antworten mit Protokoll-Fehlern (`ErrorCode`); dieser Typ
//! deckt den Server-Lebenszyklus selbst ab (Listener, Accept-Loop).

use thiserror::Error;

/// Fehlertyp fuer die Signaling-Schicht
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer die Signaling-Schicht
pub type SignalingResult<T> = Result<T, SignalingError>;
