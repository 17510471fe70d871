//! Host-Session-Tracker – Login-Bindungen und Host-Zuordnung
//!
//! Haelt die Zuordnung Login <-> Verbindung sowie den Host jeder Auktion.
//! Pro Login ist genau eine Verbindung aktiv: eine Neu-Registrierung
//! verdraengt die alte Verbindung (der Aufrufer stellt ihr die
//! Abschieds-Nachricht zu und kappt sie).
//!
//! Der Host einer Auktion wird als Login gebunden, nicht als Verbindung.
//! `host_aufloesen` geht immer ueber die Login-Zuordnung und liefert
//! damit nie eine veraltete Verbindungs-ID eines neu verbundenen Hosts.

use dashmap::DashMap;
use std::sync::Arc;

use bidcast_core::types::{AuctionId, ConnectionId, LoginId};

/// Verwaltet Login-Bindungen und die Host-Zuordnung pro Auktion
#[derive(Clone)]
pub struct HostSessionTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    /// Login -> aktuell aktive Verbindung
    login_verbindungen: DashMap<LoginId, ConnectionId>,
    /// Verbindung -> gebundener Login
    verbindung_logins: DashMap<ConnectionId, LoginId>,
    /// Auktion -> Login des Hosts
    auktion_hosts: DashMap<AuctionId, LoginId>,
}

impl HostSessionTracker {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                login_verbindungen: DashMap::new(),
                verbindung_logins: DashMap::new(),
                auktion_hosts: DashMap::new(),
            }),
        }
    }

    /// Bindet einen Login an eine Verbindung
    ///
    /// Gibt die verdraengte Verbindung zurueck falls der Login bereits
    /// woanders aktiv war.
    pub fn login_registrieren(
        &self,
        login: LoginId,
        connection_id: ConnectionId,
    ) -> Option<ConnectionId> {
        // Alte Login-Bindung dieser Verbindung aufraeumen
        if let Some((_, alter_login)) = self.inner.verbindung_logins.remove(&connection_id) {
            if alter_login != login {
                self.inner
                    .login_verbindungen
                    .remove_if(&alter_login, |_, cid| *cid == connection_id);
            }
        }

        let verdraengt = self
            .inner
            .login_verbindungen
            .insert(login.clone(), connection_id)
            .filter(|alt| *alt != connection_id);

        if let Some(alt) = verdraengt {
            self.inner
                .verbindung_logins
                .remove_if(&alt, |_, l| *l == login);
            tracing::info!(
                login = %login.als_str(),
                alt = %alt,
                neu = %connection_id,
                "Login neu gebunden, alte Verbindung verdraengt"
            );
        }

        self.inner.verbindung_logins.insert(connection_id, login);
        verdraengt
    }

    /// Login einer Verbindung
    pub fn login_von(&self, connection_id: &ConnectionId) -> Option<LoginId> {
        self.inner
            .verbindung_logins
            .get(connection_id)
            .map(|e| e.clone())
    }

    /// Aktive Verbindung eines Logins
    pub fn verbindung_von(&self, login: &LoginId) -> Option<ConnectionId> {
        self.inner.login_verbindungen.get(login).map(|e| *e)
    }

    /// Traegt den Host einer Auktion ein
    pub fn host_binden(&self, auktion: AuctionId, login: LoginId) {
        tracing::info!(auktion = %auktion, login = %login.als_str(), "Host gebunden");
        self.inner.auktion_hosts.insert(auktion, login);
    }

    /// Login des Hosts einer Auktion
    pub fn host_login_von(&self, auktion: &AuctionId) -> Option<LoginId> {
        self.inner.auktion_hosts.get(auktion).map(|e| e.clone())
    }

    /// Aktuelle Verbindung des Hosts, aufgeloest ueber die Login-Bindung
    ///
    /// None wenn kein Host gebunden ist oder der Host gerade offline ist.
    pub fn host_aufloesen(&self, auktion: &AuctionId) -> Option<ConnectionId> {
        let login = self.host_login_von(auktion)?;
        self.verbindung_von(&login)
    }

    /// Prueft ob die Verbindung der aktuell gebundene Host der Auktion ist
    pub fn ist_host(&self, auktion: &AuctionId, connection_id: &ConnectionId) -> bool {
        match (self.host_login_von(auktion), self.login_von(connection_id)) {
            (Some(host), Some(login)) => host == login,
            _ => false,
        }
    }

    /// Loest die Host-Bindung einer Auktion (Auktionsende)
    pub fn host_entbinden(&self, auktion: &AuctionId) {
        self.inner.auktion_hosts.remove(auktion);
    }

    /// Raeumt die Bindungen einer getrennten Verbindung ab
    ///
    /// Die Login-Zuordnung wird nur entfernt wenn sie noch auf diese
    /// Verbindung zeigt; die Bindung eines Nachfolgers bleibt unberuehrt.
    /// Gibt den geloesten Login zurueck.
    pub fn verbindung_getrennt(&self, connection_id: &ConnectionId) -> Option<LoginId> {
        let login = self.inner.verbindung_logins.remove(connection_id)?.1;
        self.inner
            .login_verbindungen
            .remove_if(&login, |_, cid| cid == connection_id);
        Some(login)
    }
}

impl Default for HostSessionTracker {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_registrieren_und_aufloesen() {
        let tracker = HostSessionTracker::neu();
        let cid = ConnectionId::new();
        let login = LoginId::from("host1");

        assert_eq!(tracker.login_registrieren(login.clone(), cid), None);
        assert_eq!(tracker.login_von(&cid), Some(login.clone()));
        assert_eq!(tracker.verbindung_von(&login), Some(cid));
    }

    #[test]
    fn neuregistrierung_verdraengt_alte_verbindung() {
        let tracker = HostSessionTracker::neu();
        let alt = ConnectionId::new();
        let neu = ConnectionId::new();
        let login = LoginId::from("host1");

        tracker.login_registrieren(login.clone(), alt);
        let verdraengt = tracker.login_registrieren(login.clone(), neu);

        assert_eq!(verdraengt, Some(alt));
        assert_eq!(tracker.verbindung_von(&login), Some(neu));
        assert_eq!(tracker.login_von(&alt), None);
    }

    #[test]
    fn host_aufloesen_folgt_der_login_bindung() {
        let tracker = HostSessionTracker::neu();
        let auktion = AuctionId(1);
        let login = LoginId::from("host1");

        let alt = ConnectionId::new();
        tracker.login_registrieren(login.clone(), alt);
        tracker.host_binden(auktion, login.clone());
        assert_eq!(tracker.host_aufloesen(&auktion), Some(alt));

        // Host verbindet sich neu: die Aufloesung liefert sofort die
        // neue Verbindung, nie die alte
        let neu = ConnectionId::new();
        tracker.login_registrieren(login.clone(), neu);
        assert_eq!(tracker.host_aufloesen(&auktion), Some(neu));
        assert!(tracker.ist_host(&auktion, &neu));
        assert!(!tracker.ist_host(&auktion, &alt));
    }

    #[test]
    fn host_offline_liefert_none() {
        let tracker = HostSessionTracker::neu();
        let auktion = AuctionId(1);
        let login = LoginId::from("host1");
        let cid = ConnectionId::new();

        tracker.login_registrieren(login.clone(), cid);
        tracker.host_binden(auktion, login);

        tracker.verbindung_getrennt(&cid);
        assert_eq!(tracker.host_aufloesen(&auktion), None);
        // Die Host-Bindung selbst bleibt bestehen (Host kann zurueckkommen)
        assert!(tracker.host_login_von(&auktion).is_some());
    }

    #[test]
    fn trennung_laesst_nachfolger_unberuehrt() {
        let tracker = HostSessionTracker::neu();
        let alt = ConnectionId::new();
        let neu = ConnectionId::new();
        let login = LoginId::from("host1");

        tracker.login_registrieren(login.clone(), alt);
        tracker.login_registrieren(login.clone(), neu);

        // Die verdraengte Verbindung wird erst jetzt abgebaut
        assert_eq!(tracker.verbindung_getrennt(&alt), None);
        assert_eq!(tracker.verbindung_von(&login), Some(neu));
    }

    #[test]
    fn host_entbinden() {
        let tracker = HostSessionTracker::neu();
        let auktion = AuctionId(1);
        tracker.host_binden(auktion, LoginId::from("host1"));
        tracker.host_entbinden(&auktion);
        assert_eq!(tracker.host_login_von(&auktion), None);
    }
}
