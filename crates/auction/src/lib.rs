//! bidcast-auction – Gebots-Arbitrierung
//!
//! Der [`BidArbiter`] ist die einzige Stelle die Gebote annimmt oder
//! ablehnt. Nebenlaeufige Gebote auf dasselbe Produkt werden ueber ein
//! produktweises Async-Mutex serialisiert, damit zwischen Preis-Lesen
//! und Preis-Schreiben kein zweites Gebot dazwischenfunken kann.
//!
//! Der [`GebotsLedger`] haelt den fluechtigen Sitzungszustand pro
//! Verbindung (wer hat in diesem Raum was geboten) fuer die
//! Live-Anzeige beim Host.

pub mod arbiter;
pub mod error;
pub mod ledger;

pub use arbiter::{BidArbiter, GebotErgebnis};
pub use error::AuktionError;
pub use ledger::GebotsLedger;
