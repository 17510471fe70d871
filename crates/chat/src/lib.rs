//! bidcast-chat – Raum-Chat
//!
//! Persistiert Nachrichten im Store und liefert den Verlauf fuer den
//! Raumbeitritt. Die Zustellung an die Raum-Mitglieder uebernimmt die
//! Signaling-Schicht.

pub mod error;
pub mod service;

pub use error::{ChatError, ChatResult};
pub use service::ChatRelay;
