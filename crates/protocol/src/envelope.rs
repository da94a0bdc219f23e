//! Signaling-Umschlaege (Client -> Server und Server -> Client)
//!
//! ## Design
//! - Intern getaggte Enums (`#[serde(tag = "type")]`), die Tag-Werte sind
//!   Teil des Wire-Formats und duerfen nicht umbenannt werden
//! - Zusaetzliche Felder werden beim Lesen ignoriert
//! - Unbekannte `type`-Werte landen in [`ClientNachricht::Unbekannt`]
//!   statt einen Dekodierfehler auszuloesen

use rendezvous_core::Username;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtokollFehler;

/// Fehlertext wenn der gewuenschte Name schon vergeben ist
pub const NAME_VERGEBEN: &str = "Username already taken";

/// Fehlertext beim Herunterfahren des Servers
pub const SERVER_HERUNTERFAHREN: &str = "Server shutting down";

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Nachricht die ein Client an den Server schickt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientNachricht {
    /// Namen beanspruchen
    #[serde(rename = "login")]
    Login { username: Username },

    /// Anruf beim Ziel ankuendigen
    #[serde(rename = "call")]
    Call {
        target: String,
        #[serde(rename = "callType")]
        call_type: Value,
    },

    /// SDP-Offer (opak)
    #[serde(rename = "offer")]
    Offer { target: String, offer: Value },

    /// SDP-Answer (opak)
    #[serde(rename = "answer")]
    Answer { target: String, answer: Value },

    /// ICE-Kandidat (opak)
    #[serde(rename = "ice-candidate")]
    IceCandidate { target: String, candidate: Value },

    /// Anruf ablehnen
    #[serde(rename = "decline")]
    Decline { target: String },

    /// Anruf beenden
    #[serde(rename = "end_call")]
    EndCall { target: String },

    /// Jeder andere `type`-Wert
    #[serde(other)]
    Unbekannt,
}

impl ClientNachricht {
    /// Dekodiert einen Text-Frame
    pub fn from_json(json: &str) -> Result<Self, ProtokollFehler> {
        serde_json::from_str(json).map_err(ProtokollFehler::Dekodierung)
    }

    /// Serialisiert die Nachricht (nur fuer Clients und Tests benoetigt)
    pub fn to_json(&self) -> Result<String, ProtokollFehler> {
        serde_json::to_string(self).map_err(ProtokollFehler::Kodierung)
    }

    /// Wire-Name des Nachrichtentyps, fuer Logs und Metriken
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Call { .. } => "call",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Decline { .. } => "decline",
            Self::EndCall { .. } => "end_call",
            Self::Unbekannt => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Nachricht die der Server an einen Client schickt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerNachricht {
    #[serde(rename = "login_success")]
    LoginSuccess { username: Username },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "incoming_call")]
    IncomingCall {
        from: Username,
        #[serde(rename = "callType")]
        call_type: Value,
    },

    #[serde(rename = "offer")]
    Offer { from: Username, offer: Value },

    #[serde(rename = "answer")]
    Answer { from: Username, answer: Value },

    #[serde(rename = "ice-candidate")]
    IceCandidate { from: Username, candidate: Value },

    #[serde(rename = "call_declined")]
    CallDeclined { from: Username },

    #[serde(rename = "call_ended")]
    CallEnded { from: Username },
}

impl ServerNachricht {
    /// Erstellt eine Fehler-Nachricht
    pub fn fehler(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Antwort auf einen Login mit bereits vergebenem Namen
    pub fn name_vergeben() -> Self {
        Self::fehler(NAME_VERGEBEN)
    }

    /// Antwort wenn das Ziel einer Weiterleitung nicht registriert ist
    pub fn nicht_gefunden(target: &str) -> Self {
        Self::fehler(format!("User {target} not found"))
    }

    /// Serialisiert die Nachricht als JSON-Text
    pub fn to_json(&self) -> Result<String, ProtokollFehler> {
        serde_json::to_string(self).map_err(ProtokollFehler::Kodierung)
    }

    /// Deserialisiert eine Nachricht aus JSON (Client-Seite, Tests)
    pub fn from_json(json: &str) -> Result<Self, ProtokollFehler> {
        serde_json::from_str(json).map_err(ProtokollFehler::Dekodierung)
    }

    /// Wire-Name des Nachrichtentyps
    pub fn typ(&self) -> &'static str {
        match self {
            Self::LoginSuccess { .. } => "login_success",
            Self::Error { .. } => "error",
            Self::IncomingCall { .. } => "incoming_call",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::CallDeclined { .. } => "call_declined",
            Self::CallEnded { .. } => "call_ended",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
