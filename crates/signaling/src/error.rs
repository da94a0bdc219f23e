//! Fehlertypen fuer den Signaling-Service

use rendezvous_core::Username;
use rendezvous_protocol::ProtokollFehler;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Name ist bereits von einer anderen Verbindung beansprucht
    #[error("Name bereits vergeben: {0}")]
    NameTaken(Username),

    /// Frame konnte nicht gelesen oder geschrieben werden
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// Fehler auf der WebSocket-Verbindung
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] axum::Error),

    /// Send-Queue des Empfaengers ist voll, Nachricht verworfen
    #[error("Send-Queue voll")]
    QueueVoll,

    /// Send-Queue des Empfaengers ist geschlossen (Verbindung beendet)
    #[error("Senden fehlgeschlagen")]
    SendFehler,

    /// Schreiben auf die Verbindung hat zu lange gedauert
    #[error("Timeout")]
    Timeout,
}

impl SignalingError {
    /// Kurzer, stabiler Grund fuer Metrik-Labels
    pub fn grund(&self) -> &'static str {
        match self {
            Self::NameTaken(_) => "name_taken",
            Self::Protokoll(_) => "decode",
            Self::WebSocket(_) => "transport",
            Self::QueueVoll => "queue_full",
            Self::SendFehler => "queue_closed",
            Self::Timeout => "timeout",
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
