//! bidcast-db – Datenbank-Abstraktion
//!
//! Dieses Crate stellt das Repository-Pattern bereit, das den persistenten
//! Store (Auktionen, Benutzer, Produkte, Chat, Gebots-Historie) hinter einer
//! einheitlichen Schnittstelle abstrahiert. Die Koordinations-Schicht kennt
//! nur die Traits; die SQLite-Implementierung ist austauschbar.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    AuktionRepository, BenutzerRepository, BidcastStore, ChatRepository, DbResult,
    GebotRepository, ProduktRepository,
};
pub use sqlite::pool::{DatabaseConfig, SqliteDb};
