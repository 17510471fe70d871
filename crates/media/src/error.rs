//! Fehlertypen fuer das Medien-Crate

use thiserror::Error;

/// Medien-Fehlertypen
#[derive(Debug, Error)]
pub enum MediaError {
    /// Transport, Producer oder Consumer ist nicht registriert
    #[error("Ressource nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Die Ressource gehoert einer anderen Verbindung
    #[error("Ressource gehoert einer anderen Verbindung: {0}")]
    FremdeRessource(String),

    /// Die Engine lehnt den Konsum ab (inkompatible RTP-Faehigkeiten)
    #[error("Aushandlung fehlgeschlagen: {0}")]
    Verhandlung(String),

    /// Fehler aus der Medien-Engine
    #[error("Engine-Fehler: {0}")]
    Engine(String),
}

impl MediaError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}
