//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Koordinations-Logik von der
//! konkreten Datenbank-Implementierung. Der Server haelt die Invariante
//! aus Abschnitt "Fehlerbehandlung": In-Memory-Zustand wird erst mutiert
//! nachdem der zugehoerige Store-Schreibzugriff erfolgreich war.

use bidcast_core::types::{AuctionId, LoginId, ProductKey, UserKey};

use crate::error::DbError;
use crate::models::{
    AuktionRecord, AuktionStatus, BenutzerRecord, ChatNachrichtRecord, Hoechstgebot,
    NeueChatNachricht, NeuesGebot, PreisStand, ProduktRecord, ProduktStatus,
};

/// Result-Typ fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Repository fuer Benutzer-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait BenutzerRepository: Send + Sync {
    /// Loest eine Login-Kennung zum Benutzer-Datensatz auf
    async fn benutzer_nach_login(&self, login: &LoginId) -> DbResult<Option<BenutzerRecord>>;

    /// Laedt einen Benutzer anhand seines Store-Schluessels
    async fn benutzer_nach_key(&self, key: UserKey) -> DbResult<Option<BenutzerRecord>>;
}

/// Repository fuer Auktions-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait AuktionRepository: Send + Sync {
    /// Laedt eine Auktion; None wenn unbekannt
    async fn auktion_laden(&self, auktion: AuctionId) -> DbResult<Option<AuktionRecord>>;

    /// Prueft ob `login` der autorisierte Host der Auktion ist
    async fn ist_host(&self, auktion: AuctionId, login: &LoginId) -> DbResult<bool>;

    /// Bedingter Statuswechsel; gibt true zurueck wenn der Wechsel griff
    async fn auktion_status_wechseln(
        &self,
        auktion: AuctionId,
        von: AuktionStatus,
        zu: AuktionStatus,
    ) -> DbResult<bool>;

    /// Beendet die Auktion (Status + Endzeitpunkt)
    async fn auktion_beenden(&self, auktion: AuctionId) -> DbResult<bool>;
}

/// Repository fuer Produkt-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait ProduktRepository: Send + Sync {
    /// Laedt ein Produkt; None wenn unbekannt
    async fn produkt_laden(&self, prod: ProductKey) -> DbResult<Option<ProduktRecord>>;

    /// Liest den Preis-Schnappschuss fuer die Gebotspruefung
    async fn preis_stand(&self, prod: ProductKey) -> DbResult<Option<PreisStand>>;

    /// Schreibt ein angenommenes Gebot: current_price, final_price und
    /// Gewinner in einem Zug. Gibt den aktualisierten Datensatz zurueck.
    async fn gebot_uebernehmen(
        &self,
        prod: ProductKey,
        preis: i64,
        gewinner: UserKey,
    ) -> DbResult<Option<ProduktRecord>>;

    /// Host-Korrektur: ueberschreibt final_price und Gewinner direkt,
    /// ohne Mindestgebots-Pruefung
    async fn preis_korrigieren(
        &self,
        prod: ProductKey,
        final_preis: i64,
        gewinner: Option<UserKey>,
    ) -> DbResult<Option<ProduktRecord>>;

    /// Setzt den Produkt-Status
    async fn produkt_status_setzen(&self, prod: ProductKey, status: ProduktStatus)
        -> DbResult<bool>;
}

/// Repository fuer Chat-Datenzugriffe
#[allow(async_fn_in_trait)]
pub trait ChatRepository: Send + Sync {
    /// Persistiert eine Chat-Nachricht und gibt sie mit Zeitstempel zurueck
    async fn chat_speichern(&self, data: NeueChatNachricht<'_>) -> DbResult<ChatNachrichtRecord>;

    /// Gibt die juengsten `limit` Nachrichten in chronologischer
    /// Reihenfolge zurueck (aelteste zuerst)
    async fn chat_verlauf(
        &self,
        auktion: AuctionId,
        limit: i64,
    ) -> DbResult<Vec<ChatNachrichtRecord>>;
}

/// Repository fuer die Gebots-Historie
#[allow(async_fn_in_trait)]
pub trait GebotRepository: Send + Sync {
    /// Haengt einen Historien-Eintrag an
    async fn gebot_eintragen(&self, gebot: NeuesGebot) -> DbResult<()>;

    /// Hoechstgebot des Benutzers pro Produkt innerhalb einer Auktion
    /// (fuer das Wiederherstellen des Ledgers beim Beitritt)
    async fn hoechstgebote(
        &self,
        user: UserKey,
        auktion: AuctionId,
    ) -> DbResult<Vec<Hoechstgebot>>;
}

/// Gebuendelter Store-Zugriff fuer die Koordinations-Schicht
///
/// Automatisch implementiert fuer jeden Typ der alle Teil-Repositories
/// bereitstellt (z.B. `SqliteDb`).
pub trait BidcastStore:
    BenutzerRepository + AuktionRepository + ProduktRepository + ChatRepository + GebotRepository
{
}

impl<T> BidcastStore for T where
    T: BenutzerRepository + AuktionRepository + ProduktRepository + ChatRepository + GebotRepository
{
}
