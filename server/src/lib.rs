//! bidcast-server – Bibliotheks-Root
//!
//! Verdrahtet Datenbank, Medien-Engine und Signaling-Schicht zu einem
//! lauffaehigen Server und stellt den Einstiegspunkt fuer
//! Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};

use bidcast_db::{DatabaseConfig, SqliteDb};
use bidcast_media::LoopbackEngine;
use bidcast_signaling::{AuctionServer, SignalingConfig, SignalingState};
use config::ServerConfig;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen und migrieren
    /// 2. Medien-Engine und Signaling-Zustand aufbauen
    /// 3. TCP-Listener starten
    /// 4. Auf Ctrl-C warten und alle Verbindungen geordnet trennen
    pub async fn starten(self) -> Result<()> {
        let bind_adresse = self.config.tcp_bind_adresse();
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %bind_adresse,
            "Server startet"
        );

        let db = SqliteDb::oeffnen(&DatabaseConfig {
            url: self.config.datenbank.url.clone(),
            max_verbindungen: self.config.datenbank.max_verbindungen,
            wal: self.config.datenbank.wal,
        })
        .await
        .context("Datenbankverbindung fehlgeschlagen")?;

        let signaling_config = SignalingConfig {
            server_name: self.config.server.name.clone(),
            max_clients: self.config.server.max_clients,
            keepalive_sek: self.config.server.keepalive_sek,
            verbindungs_timeout_sek: self.config.server.verbindungs_timeout_sek,
        };

        // In-Prozess-Engine; eine SFU-Anbindung implementiert denselben Trait
        let state = SignalingState::neu(signaling_config, Arc::new(db), LoopbackEngine::neu());

        let bind_addr = bind_adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse: {bind_adresse}"))?;
        let server = AuctionServer::neu(state, bind_addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let server_task = server.starten(shutdown_rx);
        tokio::pin!(server_task);

        tokio::select! {
            ergebnis = &mut server_task => {
                ergebnis.context("TCP-Listener abgestuerzt")?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Ctrl-C-Handler fehlgeschlagen")?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                let _ = shutdown_tx.send(true);
                server_task.await.context("TCP-Listener beim Shutdown")?;
            }
        }

        tracing::info!("Server beendet");
        Ok(())
    }
}
