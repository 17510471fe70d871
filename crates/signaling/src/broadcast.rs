//! Zustellung von Control-Nachrichten an verbundene Clients
//!
//! Der Broadcaster besitzt ausschliesslich die Send-Queues. Wer in
//! welchem Raum sitzt weiss allein die `RoomRegistry`; raumweite
//! Zustellungen loesen die Empfaenger dort auf. Damit gibt es genau
//! eine Mitgliedschafts-Quelle und Zaehler und Zustellung koennen
//! nicht auseinanderlaufen.
//!
//! Zustellung ist nicht-blockierend: eine volle oder geschlossene
//! Queue verwirft die Nachricht, der Aufrufer sieht das nur an der
//! Zustell-Zahl. Eine Verbindung ohne Queue (gerade verdraengt oder
//! schon getrennt) wird uebersprungen.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use bidcast_core::types::{AuctionId, ConnectionId};
use bidcast_protocol::control::ControlMessage;

use crate::rooms::RoomRegistry;

/// Kapazitaet der Send-Queue pro Verbindung
const QUEUE_KAPAZITAET: usize = 64;

/// Stellt Control-Nachrichten an einzelne Verbindungen, Raeume oder
/// alle Clients zu
#[derive(Clone)]
pub struct EventBroadcaster {
    queues: Arc<DashMap<ConnectionId, mpsc::Sender<ControlMessage>>>,
    rooms: RoomRegistry,
}

impl EventBroadcaster {
    /// Die Registry liefert die Raum-Mitglieder fuer selektive Sendungen
    pub fn neu(rooms: RoomRegistry) -> Self {
        Self {
            queues: Arc::new(DashMap::new()),
            rooms,
        }
    }

    /// Legt die Send-Queue einer neuen Verbindung an
    ///
    /// Die `ClientConnection` liest aus dem zurueckgegebenen Receiver
    /// und schreibt die Nachrichten auf den TCP-Stream.
    pub fn client_registrieren(&self, connection_id: ConnectionId) -> mpsc::Receiver<ControlMessage> {
        let (tx, rx) = mpsc::channel(QUEUE_KAPAZITAET);
        self.queues.insert(connection_id, tx);
        rx
    }

    /// Schliesst die Send-Queue einer Verbindung
    ///
    /// Der Receiver der Verbindung liefert danach `None`; ihre
    /// Sende-Schleife bricht ab und der Verbindungs-Task endet.
    pub fn client_entfernen(&self, connection_id: &ConnectionId) {
        if self.queues.remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Send-Queue geschlossen");
        }
    }

    /// Sendet an eine einzelne Verbindung; `true` bei Zustellung
    pub fn an_verbindung_senden(
        &self,
        connection_id: &ConnectionId,
        nachricht: ControlMessage,
    ) -> bool {
        self.zustellen(connection_id, nachricht)
    }

    /// Sendet an alle Mitglieder eines Auktionsraums
    ///
    /// Gibt die Anzahl der zugestellten Nachrichten zurueck.
    pub fn an_raum_senden(&self, auktion: &AuctionId, nachricht: ControlMessage) -> usize {
        self.rooms
            .mitglieder(auktion)
            .iter()
            .filter(|cid| self.zustellen(cid, nachricht.clone()))
            .count()
    }

    /// Sendet an alle Raum-Mitglieder ausser dem Ausloeser
    ///
    /// Fuer Ankuendigungen die der Verursacher schon als direkte
    /// Antwort bekommt (neuer Producer, aufgerufenes Produkt).
    pub fn an_raum_ausser_senden(
        &self,
        auktion: &AuctionId,
        ausgeschlossen: &ConnectionId,
        nachricht: ControlMessage,
    ) -> usize {
        self.rooms
            .mitglieder(auktion)
            .iter()
            .filter(|cid| *cid != ausgeschlossen)
            .filter(|cid| self.zustellen(cid, nachricht.clone()))
            .count()
    }

    /// Sendet an jede Verbindung mit offener Queue, raumunabhaengig
    ///
    /// Dashboards ohne Raum bekommen so die globalen Zaehler-Updates.
    pub fn an_alle_senden(&self, nachricht: ControlMessage) -> usize {
        self.queues
            .iter()
            .filter(|eintrag| Self::einreihen(eintrag.key(), eintrag.value(), nachricht.clone()))
            .count()
    }

    /// Anzahl der Verbindungen mit offener Send-Queue
    pub fn client_anzahl(&self) -> usize {
        self.queues.len()
    }

    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.queues.contains_key(connection_id)
    }

    fn zustellen(&self, connection_id: &ConnectionId, nachricht: ControlMessage) -> bool {
        match self.queues.get(connection_id) {
            Some(tx) => Self::einreihen(connection_id, &tx, nachricht),
            None => false,
        }
    }

    fn einreihen(
        connection_id: &ConnectionId,
        tx: &mpsc::Sender<ControlMessage>,
        nachricht: ControlMessage,
    ) -> bool {
        match tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %connection_id, "Send-Queue voll, Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aufbau() -> (EventBroadcaster, RoomRegistry) {
        let rooms = RoomRegistry::neu();
        (EventBroadcaster::neu(rooms.clone()), rooms)
    }

    fn nachricht(id: u32) -> ControlMessage {
        ControlMessage::ping(id, 0)
    }

    fn mitglied(
        broadcaster: &EventBroadcaster,
        rooms: &RoomRegistry,
        raum: AuctionId,
    ) -> (ConnectionId, mpsc::Receiver<ControlMessage>) {
        let cid = ConnectionId::new();
        rooms.verbindung_registrieren(cid);
        rooms.beitreten(cid, raum);
        let rx = broadcaster.client_registrieren(cid);
        (cid, rx)
    }

    #[tokio::test]
    async fn direktzustellung() {
        let (broadcaster, _rooms) = aufbau();
        let cid = ConnectionId::new();
        let mut rx = broadcaster.client_registrieren(cid);

        assert!(broadcaster.an_verbindung_senden(&cid, nachricht(7)));
        assert_eq!(rx.try_recv().unwrap().request_id, 7);

        assert!(!broadcaster.an_verbindung_senden(&ConnectionId::new(), nachricht(8)));
    }

    #[tokio::test]
    async fn raumzustellung_folgt_der_registry() {
        let (broadcaster, rooms) = aufbau();
        let raum = AuctionId(1);

        let (drin, mut rx_drin) = mitglied(&broadcaster, &rooms, raum);
        let (_anderswo, mut rx_anderswo) = mitglied(&broadcaster, &rooms, AuctionId(2));

        assert_eq!(broadcaster.an_raum_senden(&raum, nachricht(1)), 1);
        assert!(rx_drin.try_recv().is_ok());
        assert!(rx_anderswo.try_recv().is_err());

        // Raumwechsel in der Registry genuegt, der Broadcaster folgt
        rooms.beitreten(drin, AuctionId(2));
        assert_eq!(broadcaster.an_raum_senden(&raum, nachricht(2)), 0);
        assert_eq!(broadcaster.an_raum_senden(&AuctionId(2), nachricht(3)), 2);
    }

    #[tokio::test]
    async fn ausloeser_wird_uebersprungen() {
        let (broadcaster, rooms) = aufbau();
        let raum = AuctionId(3);

        let (ausloeser, mut rx_ausloeser) = mitglied(&broadcaster, &rooms, raum);
        let (_zuschauer, mut rx_zuschauer) = mitglied(&broadcaster, &rooms, raum);

        assert_eq!(
            broadcaster.an_raum_ausser_senden(&raum, &ausloeser, nachricht(5)),
            1
        );
        assert!(rx_ausloeser.try_recv().is_err());
        assert!(rx_zuschauer.try_recv().is_ok());
    }

    #[tokio::test]
    async fn an_alle_erreicht_auch_raumlose() {
        let (broadcaster, rooms) = aufbau();

        let (_im_raum, mut rx1) = mitglied(&broadcaster, &rooms, AuctionId(1));
        let ohne_raum = ConnectionId::new();
        let mut rx2 = broadcaster.client_registrieren(ohne_raum);

        assert_eq!(broadcaster.an_alle_senden(nachricht(9)), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn geschlossene_queue_beendet_die_zustellung() {
        let (broadcaster, rooms) = aufbau();
        let raum = AuctionId(4);

        let (getrennt, rx) = mitglied(&broadcaster, &rooms, raum);
        drop(rx);

        // Queue geschlossen, aber noch registriert: Zustellung schlaegt fehl
        assert_eq!(broadcaster.an_raum_senden(&raum, nachricht(1)), 0);

        broadcaster.client_entfernen(&getrennt);
        assert!(!broadcaster.ist_registriert(&getrennt));
        assert_eq!(broadcaster.client_anzahl(), 0);
    }

    #[tokio::test]
    async fn volle_queue_verwirft_statt_zu_blockieren() {
        let (broadcaster, _rooms) = aufbau();
        let cid = ConnectionId::new();
        let _rx = broadcaster.client_registrieren(cid);

        for i in 0..QUEUE_KAPAZITAET as u32 {
            assert!(broadcaster.an_verbindung_senden(&cid, nachricht(i)));
        }
        assert!(!broadcaster.an_verbindung_senden(&cid, nachricht(999)));
    }
}
