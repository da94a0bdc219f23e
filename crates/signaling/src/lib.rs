//! rendezvous-signaling – Namens-Registry und Nachrichten-Router
//!
//! Dieser Crate vermittelt zwischen zwei Browsern, die eine direkte
//! Medienverbindung aushandeln. Jeder Client haelt eine WebSocket-Verbindung,
//! beansprucht einen eindeutigen Namen und adressiert andere Clients ueber
//! deren Namen. Der Server leitet nur weiter und interpretiert keine Payloads.
//!
//! ## Architektur
//!
//! ```text
//! GET /ws (signaling_router)
//!     |
//!     v
//! ClientSession (pro Verbindung ein Task)
//!     |  State Machine: Unauthentifiziert -> Authentifiziert -> Beendet
//!     |
//!     v
//! MessageRouter
//!     |  login   -> ConnectionRegistry::beanspruchen
//!     |  relay   -> ConnectionRegistry::nachschlagen -> ClientSender::senden
//!     v
//! ClientSender (begrenzte Queue pro Verbindung, ein Konsument: die Session)
//! ```
//!
//! Die Registry ist der einzige geteilte, veraenderliche Zustand. Ihr Lock
//! wird nie ueber I/O gehalten.

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod sender;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use connection::ClientSession;
pub use dispatcher::{Folge, MessageRouter, SessionKontext, SessionZustand};
pub use error::{SignalingError, SignalingResult};
pub use registry::{ConnectionRegistry, NamensClaim};
pub use sender::ClientSender;
pub use server_state::{SessionSlot, SignalingConfig, SignalingState};
pub use ws::signaling_router;
