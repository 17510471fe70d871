//! Message-Handler fuer den Dispatcher
//!
//! Jeder Handler ist eine freie async-Funktion die einen Request
//! verarbeitet, noetige Broadcasts ausloest und die Antwort als
//! `ControlMessage` zurueckgibt.

pub mod chat_handler;
pub mod gebot_handler;
pub mod media_handler;
pub mod raum_handler;

use bidcast_auction::AuktionError;
use bidcast_chat::ChatError;
use bidcast_db::DbError;
use bidcast_media::MediaError;
use bidcast_protocol::control::{ControlMessage, ErrorCode};

/// Uebersetzt einen Store-Fehler in eine Fehler-Antwort
pub(crate) fn db_fehler(request_id: u32, fehler: DbError) -> ControlMessage {
    tracing::error!(fehler = %fehler, "Store-Fehler im Handler");
    ControlMessage::error(request_id, ErrorCode::StoreFailure, fehler.to_string())
}

/// Uebersetzt einen Auktions-Fehler in eine Fehler-Antwort
///
/// `GebotZuNiedrig` wird nicht hier behandelt; das ist eine regulaere
/// Ablehnung und geht als `GebotAbgelehnt` an den Bieter.
pub(crate) fn auktions_fehler(request_id: u32, fehler: AuktionError) -> ControlMessage {
    match fehler {
        AuktionError::GebotZuNiedrig { minimum } => ControlMessage::error(
            request_id,
            ErrorCode::BidTooLow,
            format!("Minimum ist {minimum}"),
        ),
        AuktionError::Validierung(msg) => {
            ControlMessage::error(request_id, ErrorCode::ValidationFailed, msg)
        }
        AuktionError::NichtGefunden(msg) => {
            ControlMessage::error(request_id, ErrorCode::ResourceNotFound, msg)
        }
        AuktionError::Datenbank(e) => db_fehler(request_id, e),
    }
}

/// Uebersetzt einen Medien-Fehler in eine Fehler-Antwort
pub(crate) fn media_fehler(request_id: u32, fehler: MediaError) -> ControlMessage {
    match fehler {
        MediaError::NichtGefunden(msg) => {
            ControlMessage::error(request_id, ErrorCode::ResourceNotFound, msg)
        }
        MediaError::FremdeRessource(msg) => {
            ControlMessage::error(request_id, ErrorCode::PermissionDenied, msg)
        }
        MediaError::Verhandlung(msg) => {
            ControlMessage::error(request_id, ErrorCode::NegotiationFailed, msg)
        }
        MediaError::Engine(msg) => {
            tracing::error!(fehler = %msg, "Engine-Fehler im Handler");
            ControlMessage::error(request_id, ErrorCode::InternalError, msg)
        }
    }
}

/// Uebersetzt einen Chat-Fehler in eine Fehler-Antwort
pub(crate) fn chat_fehler(request_id: u32, fehler: ChatError) -> ControlMessage {
    match fehler {
        ChatError::UngueltigeEingabe(msg) | ChatError::UnbekannterAbsender(msg) => {
            ControlMessage::error(request_id, ErrorCode::ValidationFailed, msg)
        }
        ChatError::Datenbank(e) => db_fehler(request_id, e),
    }
}

/// Standard-Ablehnung fuer Host-Operationen von Nicht-Hosts
pub(crate) fn nur_host(request_id: u32) -> ControlMessage {
    ControlMessage::error(
        request_id,
        ErrorCode::PermissionDenied,
        "Nur der Host der Auktion darf diese Operation ausfuehren",
    )
}
