//! Fehlertypen fuer Kodierung und Dekodierung von Frames

use thiserror::Error;

/// Fehler beim Lesen oder Schreiben eines Frames
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Frame ist kein gueltiges JSON oder passt zu keinem bekannten Feldsatz
    #[error("Ungueltiger Frame: {0}")]
    Dekodierung(#[source] serde_json::Error),

    /// Ausgehende Nachricht konnte nicht serialisiert werden
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Kodierung(#[source] serde_json::Error),
}
