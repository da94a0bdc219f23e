//! Client-Session – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientSession` in einem eigenen tokio-Task.
//! Der Task ist der einzige Schreiber auf den Socket: er liest Frames vom
//! Client, dispatcht sie und leert die eigene Send-Queue.
//!
//! ## State Machine
//! ```text
//! Unauthentifiziert --login ok--> Authentifiziert
//!        |                              |
//!        +--- login abgelehnt ---+      |
//!        |                       v      v
//!        +-------------------> Beendet (Name freigegeben)
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen WebSocket-Ping
//! - Kommt innerhalb von `verbindungs_timeout_sek` kein Frame, wird getrennt

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt};
use rendezvous_core::ConnectionId;
use rendezvous_protocol::{envelope::SERVER_HERUNTERFAHREN, ClientNachricht, ServerNachricht};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::dispatcher::{Folge, SessionKontext};
use crate::error::{SignalingError, SignalingResult};
use crate::sender::ClientSender;
use crate::server_state::{SessionSlot, SignalingState};

/// Warum die Lese-Schleife verlassen wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ende {
    /// Client hat geschlossen oder die Verbindung ist weg
    Getrennt,
    /// Lesen oder Schreiben ist fehlgeschlagen
    Transportfehler,
    /// Kein Frame innerhalb des Verbindungs-Timeouts
    Timeout,
    /// Router hat das Schliessen verlangt (z.B. Name vergeben)
    Abgelehnt,
    /// Server faehrt herunter
    Shutdown,
}

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientSession {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    connection_id: ConnectionId,
}

impl ClientSession {
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            connection_id: ConnectionId::new(),
        }
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, ein Fehler auftritt, der Router das
    /// Schliessen verlangt oder der Server herunterfaehrt. Auf jedem dieser
    /// Wege wird ein beanspruchter Name freigegeben, bevor der Slot frei wird.
    pub async fn verarbeiten(self, mut socket: WebSocket, slot: SessionSlot) {
        let config = Arc::clone(&self.state.config);
        let sende_timeout = config.sende_timeout();
        let verbindungs_timeout = config.verbindungs_timeout();
        let intervall = config.keepalive_intervall();

        tracing::info!(
            peer = %self.peer_addr,
            connection_id = %self.connection_id,
            "Neue Verbindung"
        );

        let (eigener_sender, mut queue_rx) =
            ClientSender::mit_queue(self.connection_id, config.sende_queue_groesse);
        let mut ctx = SessionKontext::neu(self.peer_addr, eigener_sender);
        let mut shutdown_rx = self.state.shutdown_empfaenger();

        let mut keepalive =
            tokio::time::interval_at(tokio::time::Instant::now() + intervall, intervall);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut letzter_empfang = Instant::now();

        let ende = loop {
            if *shutdown_rx.borrow_and_update() {
                break Ende::Shutdown;
            }

            tokio::select! {
                // Eingehender Frame vom Client
                eingehend = socket.recv() => {
                    match eingehend {
                        Some(Ok(Message::Text(text))) => {
                            letzter_empfang = Instant::now();
                            if self.text_verarbeiten(&text, &mut ctx) == Folge::Schliessen {
                                break Ende::Abgelehnt;
                            }
                        }
                        Some(Ok(Message::Binary(daten))) => {
                            letzter_empfang = Instant::now();
                            tracing::debug!(
                                connection_id = %self.connection_id,
                                bytes = daten.len(),
                                "Binaer-Frame ignoriert"
                            );
                            self.state.metriken.verworfen_zaehlen("binary");
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                            letzter_empfang = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!(
                                connection_id = %self.connection_id,
                                "Verbindung vom Client getrennt"
                            );
                            break Ende::Getrennt;
                        }
                        Some(Err(e)) => {
                            tracing::debug!(
                                connection_id = %self.connection_id,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break Ende::Transportfehler;
                        }
                    }
                }

                // Ausgehende Nachricht aus der eigenen Queue
                Some(ausgehend) = queue_rx.recv() => {
                    if let Err(e) = nachricht_schreiben(&mut socket, &ausgehend, sende_timeout).await {
                        tracing::warn!(
                            connection_id = %self.connection_id,
                            typ = ausgehend.typ(),
                            fehler = %e,
                            "Senden fehlgeschlagen"
                        );
                        break Ende::Transportfehler;
                    }
                }

                // Keepalive-Ping und Timeout-Pruefung
                _ = keepalive.tick() => {
                    if letzter_empfang.elapsed() > verbindungs_timeout {
                        tracing::warn!(connection_id = %self.connection_id, "Verbindungs-Timeout");
                        break Ende::Timeout;
                    }
                    if let Err(e) = schreiben(&mut socket, Message::Ping(Vec::new()), sende_timeout).await {
                        tracing::warn!(
                            connection_id = %self.connection_id,
                            fehler = %e,
                            "Ping-Senden fehlgeschlagen"
                        );
                        break Ende::Transportfehler;
                    }
                }

                // Shutdown-Signal, ausgewertet am Schleifenanfang
                Ok(()) = shutdown_rx.changed() => {}
            }
        };

        // Name freigeben bevor irgendetwas anderes passiert
        ctx.beenden();

        match ende {
            Ende::Abgelehnt => {
                queue_leeren(&mut socket, &mut queue_rx, sende_timeout).await;
                schliessen(&mut socket, sende_timeout).await;
            }
            Ende::Shutdown => {
                tracing::info!(
                    connection_id = %self.connection_id,
                    "Shutdown-Signal, Verbindung wird getrennt"
                );
                abschied_senden(&mut socket, self.connection_id, sende_timeout).await;
            }
            Ende::Timeout => schliessen(&mut socket, sende_timeout).await,
            Ende::Getrennt | Ende::Transportfehler => {}
        }

        drop(slot);
        tracing::info!(
            peer = %self.peer_addr,
            connection_id = %self.connection_id,
            ende = ?ende,
            "Verbindungs-Task beendet"
        );
    }

    /// Dekodiert einen Text-Frame und reicht ihn an den Router weiter
    fn text_verarbeiten(&self, text: &str, ctx: &mut SessionKontext) -> Folge {
        match ClientNachricht::from_json(text) {
            Ok(nachricht) => {
                tracing::trace!(
                    connection_id = %self.connection_id,
                    typ = nachricht.typ(),
                    "Nachricht empfangen"
                );
                self.state.router.dispatch(nachricht, ctx)
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    fehler = %e,
                    "Ungueltiger Frame verworfen"
                );
                self.state.metriken.verworfen_zaehlen("decode");
                Folge::Weiter
            }
        }
    }
}

/// Schreibt einen Frame mit Zeitlimit
async fn schreiben<S>(socket: &mut S, nachricht: Message, frist: Duration) -> SignalingResult<()>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match tokio::time::timeout(frist, socket.send(nachricht)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SignalingError::WebSocket(e)),
        Err(_) => Err(SignalingError::Timeout),
    }
}

async fn nachricht_schreiben<S>(
    socket: &mut S,
    nachricht: &ServerNachricht,
    frist: Duration,
) -> SignalingResult<()>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = nachricht.to_json()?;
    schreiben(socket, Message::Text(json), frist).await
}

/// Stellt bereits eingereihte Nachrichten noch zu (best effort)
async fn queue_leeren<S>(
    socket: &mut S,
    queue_rx: &mut mpsc::Receiver<ServerNachricht>,
    frist: Duration,
) where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    while let Ok(nachricht) = queue_rx.try_recv() {
        if let Err(e) = nachricht_schreiben(socket, &nachricht, frist).await {
            tracing::debug!(fehler = %e, "Queue nicht vollstaendig zugestellt");
            break;
        }
    }
}

/// Meldet dem Client das Herunterfahren und schliesst
async fn abschied_senden<S>(socket: &mut S, connection_id: ConnectionId, frist: Duration)
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let abschied = ServerNachricht::fehler(SERVER_HERUNTERFAHREN);
    if let Err(e) = nachricht_schreiben(socket, &abschied, frist).await {
        tracing::debug!(
            connection_id = %connection_id,
            fehler = %e,
            "Abschiedsnachricht nicht zugestellt"
        );
    }
    schliessen(socket, frist).await;
}

async fn schliessen<S>(socket: &mut S, frist: Duration)
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    if let Err(e) = schreiben(socket, Message::Close(None), frist).await {
        tracing::debug!(fehler = %e, "Close-Frame nicht gesendet");
    }
}
