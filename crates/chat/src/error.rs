//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

use bidcast_db::DbError;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Unbekannter Absender: {0}")]
    UnbekannterAbsender(String),

    #[error("Store-Fehler: {0}")]
    Datenbank(#[from] DbError),
}

/// Result-Typ fuer Chat-Operationen
pub type ChatResult<T> = Result<T, ChatError>;
