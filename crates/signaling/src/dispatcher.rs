//! Message-Router – Verarbeitet dekodierte Client-Nachrichten
//!
//! Der Router bekommt jede dekodierte Nachricht einer Session zusammen mit
//! ihrem [`SessionKontext`] und entscheidet:
//! - `login` beansprucht einen Namen in der Registry
//! - alle anderen bekannten Typen werden an das benannte Ziel weitergeleitet,
//!   mit dem eigenen Namen als `from`
//!
//! ## Zustandspruefung
//! - `login` nur im Zustand `Unauthentifiziert`, sonst ignoriert
//! - Weiterleitungen nur im Zustand `Authentifiziert`, sonst ignoriert
//!
//! Der Router macht selbst kein I/O. Antworten landen in der eigenen
//! Send-Queue, Weiterleitungen in der Queue des Ziels.

use rendezvous_core::{ConnectionId, Username};
use rendezvous_observability::RendezvousMetrics;
use rendezvous_protocol::{ClientNachricht, ServerNachricht};
use std::net::SocketAddr;

use crate::error::SignalingError;
use crate::registry::{ConnectionRegistry, NamensClaim};
use crate::sender::ClientSender;

/// Zustand einer Session
#[derive(Debug)]
pub enum SessionZustand {
    /// Verbunden, noch kein Name
    Unauthentifiziert,
    /// Haelt einen Namen bis der Claim gedroppt wird
    Authentifiziert(NamensClaim),
    /// Verbindung beendet, Name (falls vorhanden) freigegeben
    Beendet,
}

/// Was die Session nach einer Nachricht tun soll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folge {
    Weiter,
    /// Ausstehende Antworten zustellen, dann Verbindung schliessen
    Schliessen,
}

/// Kontext einer einzelnen Verbindung
#[derive(Debug)]
pub struct SessionKontext {
    pub connection_id: ConnectionId,
    pub peer_addr: SocketAddr,
    /// Eigene Send-Queue fuer Antworten an diesen Client
    pub eigener_sender: ClientSender,
    pub zustand: SessionZustand,
}

impl SessionKontext {
    pub fn neu(peer_addr: SocketAddr, eigener_sender: ClientSender) -> Self {
        Self {
            connection_id: eigener_sender.connection_id(),
            peer_addr,
            eigener_sender,
            zustand: SessionZustand::Unauthentifiziert,
        }
    }

    /// Name der Session, falls authentifiziert
    pub fn name(&self) -> Option<&Username> {
        match &self.zustand {
            SessionZustand::Authentifiziert(claim) => Some(claim.name()),
            _ => None,
        }
    }

    /// Beendet die Session und gibt den Namen frei
    ///
    /// Idempotent; ein zweiter Aufruf aendert nichts.
    pub fn beenden(&mut self) {
        let vorher = std::mem::replace(&mut self.zustand, SessionZustand::Beendet);
        if let SessionZustand::Authentifiziert(claim) = vorher {
            tracing::info!(
                name = %claim.name(),
                connection_id = %self.connection_id,
                "Session beendet, Name freigegeben"
            );
            // Drop gibt den Namen frei
        }
    }
}

/// Zentraler Nachrichten-Router
#[derive(Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
    metriken: RendezvousMetrics,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl MessageRouter {
    pub fn neu(registry: ConnectionRegistry, metriken: RendezvousMetrics) -> Self {
        Self { registry, metriken }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Verarbeitet eine dekodierte Nachricht
    pub fn dispatch(&self, nachricht: ClientNachricht, ctx: &mut SessionKontext) -> Folge {
        match nachricht {
            ClientNachricht::Login { username } => self.login(username, ctx),
            ClientNachricht::Unbekannt => {
                tracing::debug!(
                    connection_id = %ctx.connection_id,
                    "Unbekannter Nachrichtentyp ignoriert"
                );
                self.metriken.verworfen_zaehlen("unknown_type");
                Folge::Weiter
            }
            relay => {
                self.weiterleiten(relay, ctx);
                Folge::Weiter
            }
        }
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    fn login(&self, username: Username, ctx: &mut SessionKontext) -> Folge {
        match &ctx.zustand {
            SessionZustand::Unauthentifiziert => {}
            SessionZustand::Authentifiziert(claim) => {
                tracing::warn!(
                    connection_id = %ctx.connection_id,
                    name = %claim.name(),
                    angefragt = %username,
                    "Erneuter Login ignoriert"
                );
                self.metriken.login_zaehlen("ignored");
                return Folge::Weiter;
            }
            SessionZustand::Beendet => return Folge::Weiter,
        }

        match self
            .registry
            .beanspruchen(username.clone(), ctx.eigener_sender.clone())
        {
            Ok(claim) => {
                ctx.zustand = SessionZustand::Authentifiziert(claim);
                self.metriken.login_zaehlen("ok");
                tracing::info!(
                    name = %username,
                    connection_id = %ctx.connection_id,
                    peer = %ctx.peer_addr,
                    "Login erfolgreich"
                );
                self.antworten(ctx, ServerNachricht::LoginSuccess { username });
                Folge::Weiter
            }
            Err(SignalingError::NameTaken(name)) => {
                self.metriken.login_zaehlen("taken");
                tracing::info!(
                    name = %name,
                    connection_id = %ctx.connection_id,
                    "Login abgelehnt, Name vergeben"
                );
                self.antworten(ctx, ServerNachricht::name_vergeben());
                Folge::Schliessen
            }
            Err(e) => {
                tracing::error!(connection_id = %ctx.connection_id, "Login fehlgeschlagen: {e}");
                Folge::Schliessen
            }
        }
    }

    // -----------------------------------------------------------------------
    // Weiterleitung
    // -----------------------------------------------------------------------

    fn weiterleiten(&self, nachricht: ClientNachricht, ctx: &SessionKontext) {
        let typ = nachricht.typ();

        let Some(absender) = ctx.name().cloned() else {
            tracing::debug!(
                connection_id = %ctx.connection_id,
                typ,
                "Weiterleitung vor Login ignoriert"
            );
            self.metriken.verworfen_zaehlen("unauthenticated");
            return;
        };

        let Some((ziel, ausgehend)) = umschlag(nachricht, absender.clone()) else {
            return;
        };

        let Some(empfaenger) = self.registry.nachschlagen(&ziel) else {
            tracing::debug!(from = %absender, ziel = %ziel, typ, "Ziel nicht registriert");
            self.metriken.verworfen_zaehlen("target_not_found");
            self.antworten(ctx, ServerNachricht::nicht_gefunden(&ziel));
            return;
        };

        match empfaenger.senden(ausgehend) {
            Ok(()) => {
                self.metriken.relay_zaehlen(typ);
                tracing::debug!(from = %absender, ziel = %ziel, typ, "Weitergeleitet");
            }
            Err(e) => {
                // Ziel existierte beim Nachschlagen; der Absender wird nicht benachrichtigt
                self.metriken.verworfen_zaehlen(e.grund());
                tracing::warn!(
                    from = %absender,
                    ziel = %ziel,
                    typ,
                    "Zustellung fehlgeschlagen: {e}"
                );
            }
        }
    }

    /// Reiht eine Antwort in die eigene Queue ein
    fn antworten(&self, ctx: &SessionKontext, nachricht: ServerNachricht) {
        if let Err(e) = ctx.eigener_sender.senden(nachricht) {
            self.metriken.verworfen_zaehlen(e.grund());
        }
    }
}

/// Baut aus einer Relay-Nachricht Ziel und ausgehende Nachricht
///
/// Payloads werden unveraendert uebernommen.
fn umschlag(nachricht: ClientNachricht, from: Username) -> Option<(String, ServerNachricht)> {
    let paar = match nachricht {
        ClientNachricht::Call { target, call_type } => {
            (target, ServerNachricht::IncomingCall { from, call_type })
        }
        ClientNachricht::Offer { target, offer } => (target, ServerNachricht::Offer { from, offer }),
        ClientNachricht::Answer { target, answer } => {
            (target, ServerNachricht::Answer { from, answer })
        }
        ClientNachricht::IceCandidate { target, candidate } => {
            (target, ServerNachricht::IceCandidate { from, candidate })
        }
        ClientNachricht::Decline { target } => (target, ServerNachricht::CallDeclined { from }),
        ClientNachricht::EndCall { target } => (target, ServerNachricht::CallEnded { from }),
        ClientNachricht::Login { .. } | ClientNachricht::Unbekannt => return None,
    };
    Some(paar)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct TestClient {
        ctx: SessionKontext,
        rx: mpsc::Receiver<ServerNachricht>,
    }

    impl TestClient {
        fn neu() -> Self {
            let (sender, rx) = ClientSender::mit_queue(ConnectionId::new(), 16);
            Self {
                ctx: SessionKontext::neu("127.0.0.1:5000".parse().unwrap(), sender),
                rx,
            }
        }

        fn naechste(&mut self) -> Option<ServerNachricht> {
            self.rx.try_recv().ok()
        }
    }

    fn router() -> (MessageRouter, RendezvousMetrics) {
        let metriken = RendezvousMetrics::neu().unwrap();
        let registry = ConnectionRegistry::mit_metriken(metriken.clone());
        (MessageRouter::neu(registry, metriken.clone()), metriken)
    }

    fn login(name: &str) -> ClientNachricht {
        ClientNachricht::Login {
            username: Username::neu(name).unwrap(),
        }
    }

    fn n(s: &str) -> Username {
        Username::neu(s).unwrap()
    }

    fn angemeldet(router: &MessageRouter, name: &str) -> TestClient {
        let mut client = TestClient::neu();
        assert_eq!(router.dispatch(login(name), &mut client.ctx), Folge::Weiter);
        assert_eq!(
            client.naechste(),
            Some(ServerNachricht::LoginSuccess { username: n(name) })
        );
        client
    }

    #[test]
    fn login_erfolgreich() {
        let (router, metriken) = router();
        let client = angemeldet(&router, "alice");

        assert_eq!(client.ctx.name().map(Username::as_str), Some("alice"));
        assert!(router.registry().ist_registriert("alice"));
        assert_eq!(metriken.logins_total.with_label_values(&["ok"]).get(), 1);
    }

    #[test]
    fn login_mit_vergebenem_namen_schliesst() {
        let (router, _) = router();
        let _alice = angemeldet(&router, "alice");

        let mut zweiter = TestClient::neu();
        let folge = router.dispatch(login("alice"), &mut zweiter.ctx);

        assert_eq!(folge, Folge::Schliessen);
        assert_eq!(zweiter.naechste(), Some(ServerNachricht::name_vergeben()));
        assert!(zweiter.ctx.name().is_none());
    }

    #[test]
    fn zweiter_login_wird_ignoriert() {
        let (router, _) = router();
        let mut alice = angemeldet(&router, "alice");

        let folge = router.dispatch(login("alice2"), &mut alice.ctx);
        assert_eq!(folge, Folge::Weiter);
        assert!(alice.naechste().is_none());
        assert_eq!(alice.ctx.name().map(Username::as_str), Some("alice"));
        assert!(!router.registry().ist_registriert("alice2"));
    }

    #[test]
    fn call_wird_mit_absender_weitergeleitet() {
        let (router, metriken) = router();
        let mut alice = angemeldet(&router, "alice");
        let mut bob = angemeldet(&router, "bob");

        let call = ClientNachricht::Call {
            target: "bob".into(),
            call_type: json!("video"),
        };
        router.dispatch(call, &mut alice.ctx);

        assert_eq!(
            bob.naechste(),
            Some(ServerNachricht::IncomingCall {
                from: n("alice"),
                call_type: json!("video"),
            })
        );
        assert!(alice.naechste().is_none());
        assert_eq!(
            metriken.frames_relayed_total.with_label_values(&["call"]).get(),
            1
        );
    }

    #[test]
    fn payloads_bleiben_unveraendert() {
        let (router, _) = router();
        let mut alice = angemeldet(&router, "alice");
        let mut bob = angemeldet(&router, "bob");

        let candidate = json!({"candidate": "candidate:1 1 UDP 2122 10.0.0.1 5000 typ host", "sdpMLineIndex": 0, "extra": [1, null]});
        router.dispatch(
            ClientNachricht::IceCandidate {
                target: "bob".into(),
                candidate: candidate.clone(),
            },
            &mut alice.ctx,
        );

        assert_eq!(
            bob.naechste(),
            Some(ServerNachricht::IceCandidate {
                from: n("alice"),
                candidate,
            })
        );
    }

    #[test]
    fn decline_und_end_call() {
        let (router, _) = router();
        let mut alice = angemeldet(&router, "alice");
        let mut bob = angemeldet(&router, "bob");

        router.dispatch(ClientNachricht::Decline { target: "alice".into() }, &mut bob.ctx);
        router.dispatch(ClientNachricht::EndCall { target: "bob".into() }, &mut alice.ctx);

        assert_eq!(alice.naechste(), Some(ServerNachricht::CallDeclined { from: n("bob") }));
        assert_eq!(bob.naechste(), Some(ServerNachricht::CallEnded { from: n("alice") }));
    }

    #[test]
    fn unbekanntes_ziel_meldet_fehler_an_absender() {
        let (router, metriken) = router();
        let mut alice = angemeldet(&router, "alice");

        router.dispatch(
            ClientNachricht::Offer {
                target: "ghost".into(),
                offer: json!({"sdp": "v=0"}),
            },
            &mut alice.ctx,
        );

        assert_eq!(
            alice.naechste(),
            Some(ServerNachricht::fehler("User ghost not found"))
        );
        assert_eq!(
            metriken
                .frames_dropped_total
                .with_label_values(&["target_not_found"])
                .get(),
            1
        );
    }

    #[test]
    fn weiterleitung_vor_login_wird_ignoriert() {
        let (router, metriken) = router();
        let mut bob = angemeldet(&router, "bob");
        let mut anonym = TestClient::neu();

        let folge = router.dispatch(
            ClientNachricht::Call {
                target: "bob".into(),
                call_type: json!("audio"),
            },
            &mut anonym.ctx,
        );

        assert_eq!(folge, Folge::Weiter);
        assert!(bob.naechste().is_none());
        assert!(anonym.naechste().is_none());
        assert_eq!(
            metriken
                .frames_dropped_total
                .with_label_values(&["unauthenticated"])
                .get(),
            1
        );
    }

    #[test]
    fn unbekannter_typ_wird_ignoriert() {
        let (router, _) = router();
        let mut alice = angemeldet(&router, "alice");

        assert_eq!(
            router.dispatch(ClientNachricht::Unbekannt, &mut alice.ctx),
            Folge::Weiter
        );
        assert!(alice.naechste().is_none());
    }

    #[test]
    fn weiterleitung_an_sich_selbst() {
        let (router, _) = router();
        let mut alice = angemeldet(&router, "alice");

        router.dispatch(ClientNachricht::EndCall { target: "alice".into() }, &mut alice.ctx);
        assert_eq!(alice.naechste(), Some(ServerNachricht::CallEnded { from: n("alice") }));
    }

    #[test]
    fn volle_ziel_queue_verwirft_ohne_rueckmeldung() {
        let (router, metriken) = router();
        let mut alice = angemeldet(&router, "alice");

        let (bob_sender, _bob_rx) = ClientSender::mit_queue(ConnectionId::new(), 1);
        let mut bob_ctx = SessionKontext::neu("127.0.0.1:5001".parse().unwrap(), bob_sender);
        // LoginSuccess belegt den einzigen Platz
        router.dispatch(login("bob"), &mut bob_ctx);

        router.dispatch(ClientNachricht::Decline { target: "bob".into() }, &mut alice.ctx);

        assert!(alice.naechste().is_none());
        assert_eq!(
            metriken
                .frames_dropped_total
                .with_label_values(&["queue_full"])
                .get(),
            1
        );
    }

    #[test]
    fn geschlossene_ziel_queue_verwirft_ohne_rueckmeldung() {
        let (router, metriken) = router();
        let mut alice = angemeldet(&router, "alice");

        let (bob_sender, bob_rx) = ClientSender::mit_queue(ConnectionId::new(), 8);
        let mut bob_ctx = SessionKontext::neu("127.0.0.1:5002".parse().unwrap(), bob_sender);
        router.dispatch(login("bob"), &mut bob_ctx);
        // Task von bob ist weg, der Claim lebt noch
        drop(bob_rx);
        assert!(router.registry().ist_registriert("bob"));

        router.dispatch(
            ClientNachricht::EndCall { target: "bob".into() },
            &mut alice.ctx,
        );

        assert!(alice.naechste().is_none());
        assert_eq!(
            metriken
                .frames_dropped_total
                .with_label_values(&["queue_closed"])
                .get(),
            1
        );
        assert_eq!(
            metriken
                .frames_dropped_total
                .with_label_values(&["target_not_found"])
                .get(),
            0
        );
    }

    #[test]
    fn beenden_gibt_namen_frei() {
        let (router, _) = router();
        let mut alice = angemeldet(&router, "alice");

        alice.ctx.beenden();
        assert!(matches!(alice.ctx.zustand, SessionZustand::Beendet));
        assert!(!router.registry().ist_registriert("alice"));

        // Idempotent
        alice.ctx.beenden();
        let _neu = angemeldet(&router, "alice");
    }

    #[test]
    fn nach_beenden_keine_weiterleitung() {
        let (router, _) = router();
        let mut alice = angemeldet(&router, "alice");
        let mut bob = angemeldet(&router, "bob");

        alice.ctx.beenden();
        router.dispatch(ClientNachricht::EndCall { target: "bob".into() }, &mut alice.ctx);
        assert!(bob.naechste().is_none());
    }
}
