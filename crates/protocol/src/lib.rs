//! rendezvous-protocol – Nachrichtentypen des Signaling-Protokolls
//!
//! Jeder WebSocket-Text-Frame enthaelt genau ein JSON-Objekt der Form
//! `{"type": ..., ...}`. Das Feld `type` waehlt die restlichen Felder aus.
//! SDP-Offers/-Answers und ICE-Kandidaten bleiben fuer den Server opak
//! (`serde_json::Value`) und werden unveraendert weitergereicht.

pub mod envelope;
pub mod error;

pub use envelope::{ClientNachricht, ServerNachricht};
pub use error::ProtokollFehler;
