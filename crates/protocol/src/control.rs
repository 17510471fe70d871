//! Control-Protokoll (TCP)
//!
//! Definiert alle Steuerungsnachrichten die ueber die TCP-Verbindung
//! zwischen Client und Server ausgetauscht werden.
//!
//! ## Design
//! - Request/Response Pattern: jede Nachricht hat eine `request_id: u32`
//! - JSON-Serialisierung via serde (TCP, nicht zeitkritisch)
//! - Tagged Enums fuer typsichere Nachrichtentypen
//! - Broadcasts tragen `request_id = 0` (keine Zuordnung zu einem Request)
//!
//! RTP-Parameter, ICE-Kandidaten und Codec-Faehigkeiten sind fuer den
//! Koordinations-Kern opake Blobs (`serde_json::Value`) – sie werden
//! unveraendert zwischen Client und Medien-Engine durchgereicht.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bidcast_core::types::{
    AuctionId, ConnectionId, ConsumerId, LoginId, ProducerId, ProductKey, TransportId, UserKey,
};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidRequest,
    // Validierung
    ValidationFailed,
    AuctionNotFound,
    // Gebote
    BidTooLow,
    // Medien-Ressourcen
    ResourceNotFound,
    NegotiationFailed,
    // Autorisierung
    PermissionDenied,
    // Persistenz
    StoreFailure,
}

// ---------------------------------------------------------------------------
// Gemeinsame Info-Typen
// ---------------------------------------------------------------------------

/// Medienart eines Producers/Consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedienArt {
    Audio,
    Video,
}

impl MedienArt {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Richtung eines Medien-Transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportRichtung {
    /// Sendet Medien vom Client zum Server
    Send,
    /// Empfaengt Medien vom Server
    Recv,
}

/// Produkt-Schnappschuss wie ihn Clients sehen
///
/// Spiegelt den Datensatz aus dem Store; `current_price` ist `None`
/// solange noch kein Gebot angenommen wurde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduktInfo {
    pub prod_key: ProductKey,
    pub auktion: AuctionId,
    pub name: String,
    pub detail: Option<String>,
    /// Mindest-Erhoehungsschritt pro Gebot
    pub unit_value: i64,
    /// Startpreis (Minimum fuer das erste Gebot)
    pub init_price: i64,
    pub current_price: Option<i64>,
    pub final_price: Option<i64>,
    pub winner: Option<UserKey>,
    pub status: String,
    pub file_url: Option<String>,
}

/// Informationen ueber den Bieter eines angenommenen Gebots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BieterInfo {
    pub user_key: Option<UserKey>,
    pub login: Option<LoginId>,
    pub nickname: Option<String>,
    /// Verbindung von der das Gebot kam (None bei Host-Korrekturen)
    pub connection: Option<ConnectionId>,
}

/// Einzelner Gebots-Eintrag im Ledger (Produkt -> letzter Betrag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GebotEintrag {
    pub produkt: ProductKey,
    pub betrag: i64,
}

/// Ledger-Eintrag einer Verbindung in einem Auktionsraum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEintragInfo {
    pub connection: ConnectionId,
    pub user_key: Option<UserKey>,
    pub nickname: String,
    pub gebote: Vec<GebotEintrag>,
}

/// Chat-Nachricht wie sie Clients sehen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatNachrichtInfo {
    pub nickname: String,
    pub inhalt: String,
    pub zeitstempel: DateTime<Utc>,
}

/// Producer-Eintrag fuer `VorhandeneProduzentenResponse` / `NeuerProduzent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub producer_id: ProducerId,
    pub connection: ConnectionId,
    pub kind: MedienArt,
}

/// Verbindungsparameter eines frisch erstellten Transports
///
/// Der Client schliesst damit die ICE/DTLS-Verhandlung ab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportBeschreibung {
    pub transport_id: TransportId,
    pub ice_parameter: serde_json::Value,
    pub ice_kandidaten: serde_json::Value,
    pub dtls_parameter: serde_json::Value,
}

/// Beschreibung eines erstellten Consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerBeschreibung {
    pub consumer_id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MedienArt,
    pub rtp_parameter: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Raum-Nachrichten
// ---------------------------------------------------------------------------

/// Einer Auktion beitreten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuktionBeitretenRequest {
    pub auktion: AuctionId,
    pub login: LoginId,
}

/// Bestaetigung des Beitritts mit allem was der Client zum Start braucht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuktionBeitretenResponse {
    /// Verbindung des Hosts (None wenn der Host offline ist)
    pub host_connection: Option<ConnectionId>,
    pub host_login: LoginId,
    pub user_count: usize,
    pub chat_verlauf: Vec<ChatNachrichtInfo>,
    pub ausgewaehltes_produkt: Option<ProduktInfo>,
}

/// Batch-Abfrage der Zuschauerzahlen (Dashboard-Bootstrap)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GastAnzahlenRequest {
    pub auktionen: Vec<AuctionId>,
}

/// Zuschauerzahl einer einzelnen Auktion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GastAnzahl {
    pub auktion: AuctionId,
    pub anzahl: usize,
}

/// Antwort auf die Batch-Abfrage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GastAnzahlenResponse {
    pub anzahlen: Vec<GastAnzahl>,
}

/// Login-Kennung an die Verbindung binden (Host-Registrierung)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRegistrierenRequest {
    pub login: LoginId,
    pub auktion: AuctionId,
}

// ---------------------------------------------------------------------------
// Medien-Nachrichten
// ---------------------------------------------------------------------------

/// Transport anlegen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportErstellenRequest {
    pub richtung: TransportRichtung,
}

/// Transport-Verhandlung abschliessen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportVerbindenRequest {
    pub transport_id: TransportId,
    pub dtls_parameter: serde_json::Value,
}

/// Ausgehenden Medienstrom anlegen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduzierenRequest {
    pub transport_id: TransportId,
    pub kind: MedienArt,
    pub rtp_parameter: serde_json::Value,
    pub auktion: AuctionId,
}

/// Bestaetigung mit der neuen Producer-ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduzierenResponse {
    pub producer_id: ProducerId,
}

/// Fremden Medienstrom konsumieren
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KonsumierenRequest {
    pub producer_id: ProducerId,
    pub rtp_faehigkeiten: serde_json::Value,
    pub transport_id: TransportId,
    pub auktion: AuctionId,
    /// Consumer pausiert anlegen (Client setzt ihn spaeter fort)
    #[serde(default)]
    pub pausiert: bool,
}

/// Pausierten Consumer fortsetzen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerFortsetzenRequest {
    pub consumer_id: ConsumerId,
}

/// Alle aktiven Producer eines Raums abfragen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VorhandeneProduzentenRequest {
    pub auktion: AuctionId,
}

/// Antwort mit Producer-Liste und Host-Verbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VorhandeneProduzentenResponse {
    pub produzenten: Vec<ProducerInfo>,
    pub host_connection: Option<ConnectionId>,
}

/// Eigene Producer in einem Raum schliessen (Sendung beenden)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduzentenSchliessenRequest {
    pub auktion: AuctionId,
}

// ---------------------------------------------------------------------------
// Gebots-Nachrichten
// ---------------------------------------------------------------------------

/// Host waehlt das naechste Produkt zur Versteigerung aus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduktAuswaehlenRequest {
    pub auktion: AuctionId,
    pub produkt: ProduktInfo,
}

/// Gebotsversuch eines Bieters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GebotAbgebenRequest {
    pub auktion: AuctionId,
    pub produkt: ProductKey,
    pub betrag: i64,
    pub login: LoginId,
}

/// Ausgang einer Finalisierung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GebotAusgang {
    /// Zuschlag – das Produkt geht an den Hoechstbietenden
    Zuschlag,
    /// Rueckgabe – kein gueltiger Zuschlag, Produkt bleibt unverkauft
    Rueckgabe,
}

/// Host finalisiert ein Produkt (Zuschlag oder Rueckgabe)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GebotFinalisierenRequest {
    pub auktion: AuctionId,
    pub produkt: ProductKey,
    pub gewinner: Option<UserKey>,
    pub ausgang: GebotAusgang,
}

/// Host korrigiert Preis und Gewinner direkt (Fehlzuschlag rueckgaengig)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GebotZuruecksetzenRequest {
    pub auktion: AuctionId,
    pub produkt: ProductKey,
    pub gewinner: Option<UserKey>,
    pub final_preis: i64,
}

// ---------------------------------------------------------------------------
// Chat- und Lifecycle-Nachrichten
// ---------------------------------------------------------------------------

/// Chat-Nachricht senden
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSendenRequest {
    pub auktion: AuctionId,
    pub login: LoginId,
    pub inhalt: String,
}

/// Auktion beenden (nur Host)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuktionBeendenRequest {
    pub auktion: AuctionId,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (Client -> Server oder Server -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    /// Originaler Timestamp aus dem Ping
    pub echo_timestamp_ms: u64,
    /// Server-eigener Timestamp
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Server-Broadcasts
// ---------------------------------------------------------------------------

/// Raumweiter Teilnehmerzaehler (nach Join/Leave/Disconnect)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCountUpdate {
    pub auktion: AuctionId,
    pub user_count: usize,
}

/// Globaler Zuschauerzaehler fuer Dashboards (an alle Verbindungen)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GastAnzahlUpdate {
    pub auktion: AuctionId,
    pub anzahl: usize,
}

/// Vollstaendiger Ledger eines Raums (nach jeder Gebots-Mutation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerUpdate {
    pub auktion: AuctionId,
    pub eintraege: Vec<LedgerEintragInfo>,
}

/// Ein Raummitglied hat einen neuen Medienstrom gestartet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuerProduzent {
    pub producer_id: ProducerId,
    pub connection: ConnectionId,
    pub kind: MedienArt,
}

/// Ein Producer wurde geschlossen (Sender weg oder getrennt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduzentGeschlossen {
    pub connection: ConnectionId,
    pub producer_id: ProducerId,
}

/// Der Host ist jetzt (wieder) erreichbar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostVerfuegbar {
    pub auktion: AuctionId,
    pub host_connection: ConnectionId,
}

/// Host hat ein Produkt zur Versteigerung ausgewaehlt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduktAusgewaehlt {
    pub produkt: ProduktInfo,
}

/// Preis/Gewinner eines Produkts haben sich geaendert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GebotUpdate {
    pub produkt: ProduktInfo,
    pub bieter: BieterInfo,
}

/// Gebot wurde abgelehnt (nur an den Bieter selbst)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GebotAbgelehnt {
    pub grund: String,
}

/// Finalisierungs-Ergebnis eines Produkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GebotStatus {
    pub produkt: ProductKey,
    pub gewinner_login: Option<LoginId>,
    pub gewinner_nickname: Option<String>,
    pub ausgang: GebotAusgang,
}

/// Auktion wurde vom Host beendet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuktionBeendet {
    pub auktion: AuctionId,
    pub nachricht: String,
}

/// Begruessung nach dem Verbindungsaufbau (teilt die eigene ID mit)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Willkommen {
    pub connection: ConnectionId,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: ControlPayload
// ---------------------------------------------------------------------------

/// Alle moeglichen Control-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPayload {
    // Raum
    AuktionBeitreten(AuktionBeitretenRequest),
    AuktionBeitretenResponse(AuktionBeitretenResponse),
    GastAnzahlen(GastAnzahlenRequest),
    GastAnzahlenResponse(GastAnzahlenResponse),
    LoginRegistrieren(LoginRegistrierenRequest),
    LoginRegistrierenResponse,

    // Medien
    RouterFaehigkeiten,
    RouterFaehigkeitenResponse { rtp_faehigkeiten: serde_json::Value },
    TransportErstellen(TransportErstellenRequest),
    TransportErstellenResponse(TransportBeschreibung),
    TransportVerbinden(TransportVerbindenRequest),
    TransportVerbindenResponse,
    Produzieren(ProduzierenRequest),
    ProduzierenResponse(ProduzierenResponse),
    Konsumieren(KonsumierenRequest),
    KonsumierenResponse(ConsumerBeschreibung),
    ConsumerFortsetzen(ConsumerFortsetzenRequest),
    ConsumerFortsetzenResponse,
    VorhandeneProduzenten(VorhandeneProduzentenRequest),
    VorhandeneProduzentenResponse(VorhandeneProduzentenResponse),
    ProduzentenSchliessen(ProduzentenSchliessenRequest),
    ProduzentenSchliessenResponse,

    // Gebote
    ProduktAuswaehlen(ProduktAuswaehlenRequest),
    GebotAbgeben(GebotAbgebenRequest),
    GebotAkzeptiert,
    GebotAbgelehnt(GebotAbgelehnt),
    GebotFinalisieren(GebotFinalisierenRequest),
    GebotZuruecksetzen(GebotZuruecksetzenRequest),

    // Chat & Lifecycle
    ChatSenden(ChatSendenRequest),
    AuktionBeenden(AuktionBeendenRequest),

    // Broadcasts (Server -> Client)
    Willkommen(Willkommen),
    UserCountUpdate(UserCountUpdate),
    GastAnzahlUpdate(GastAnzahlUpdate),
    LedgerUpdate(LedgerUpdate),
    NeuerProduzent(NeuerProduzent),
    ProduzentGeschlossen(ProduzentGeschlossen),
    HostVerfuegbar(HostVerfuegbar),
    ProduktAusgewaehlt(ProduktAusgewaehlt),
    GebotUpdate(GebotUpdate),
    GebotStatus(GebotStatus),
    ChatNachricht(ChatNachrichtInfo),
    AuktionBeendet(AuktionBeendet),
    /// Die Verbindung wurde serverseitig ersetzt (Login woanders aktiv)
    VerbindungErsetzt,

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Error
    Error(ErrorResponse),
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    /// Optionale maschinenlesbare Details
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Control-Frame (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Control-Protokoll-Nachricht mit Request/Response-Zuordnung
///
/// Jede Nachricht traegt eine `request_id` die der Client vergibt.
/// Der Server kopiert die ID in die Antwort damit der Client
/// Request und Response zuordnen kann. Broadcasts tragen die ID 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Eindeutige Nachrichten-ID fuer Request/Response-Zuordnung
    pub request_id: u32,
    /// Inhalt der Nachricht
    pub payload: ControlPayload,
}

impl ControlMessage {
    /// Erstellt eine neue Control-Nachricht
    pub fn new(request_id: u32, payload: ControlPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt eine Broadcast-Nachricht (request_id = 0)
    pub fn broadcast(payload: ControlPayload) -> Self {
        Self::new(0, payload)
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Ping(PingMessage { timestamp_ms }),
        )
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::Error(ErrorResponse {
                code,
                message: message.into(),
                details: None,
            }),
        )
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
