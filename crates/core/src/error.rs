//! Fehlertypen fuer Rendezvous
//!
//! Zentraler Fehler-Enum fuer die geteilten Typen. Die Crates fuer Protokoll
//! und Signaling definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Fehler der gemeinsamen Bausteine
#[derive(Debug, Error)]
pub enum RendezvousError {
    #[error("Ungueltiger Benutzername: {0:?}")]
    UngueltigerName(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}
