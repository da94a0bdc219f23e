//! Client-Sender – Ausgehende Queue einer einzelnen Verbindung
//!
//! Jede Session besitzt genau eine begrenzte Queue. Andere Sessions reihen
//! dort nicht-blockierend ein; nur die besitzende Session liest daraus und
//! schreibt auf den Socket. Dadurch werden Sendungen an eine Verbindung nie
//! parallel versucht, und ein langsamer Empfaenger blockiert weder die
//! Registry noch die Zustellung an andere.

use rendezvous_core::ConnectionId;
use rendezvous_protocol::ServerNachricht;
use tokio::sync::mpsc;

use crate::error::{SignalingError, SignalingResult};

/// Standardgroesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    connection_id: ConnectionId,
    tx: mpsc::Sender<ServerNachricht>,
}

impl ClientSender {
    /// Erstellt Sender und zugehoerigen Empfaenger mit der gegebenen Kapazitaet
    pub fn mit_queue(
        connection_id: ConnectionId,
        groesse: usize,
    ) -> (Self, mpsc::Receiver<ServerNachricht>) {
        let (tx, rx) = mpsc::channel(groesse.max(1));
        (Self { connection_id, tx }, rx)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Reiht eine Nachricht nicht-blockierend ein
    ///
    /// Eine volle Queue verwirft die Nachricht, eine geschlossene Queue
    /// bedeutet dass die Verbindung bereits beendet ist.
    pub fn senden(&self, nachricht: ServerNachricht) -> SignalingResult<()> {
        match self.tx.try_send(nachricht) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(verworfen)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    typ = verworfen.typ(),
                    "Send-Queue voll – Nachricht verworfen"
                );
                Err(SignalingError::QueueVoll)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Client getrennt)"
                );
                Err(SignalingError::SendFehler)
            }
        }
    }

    /// Prueft ob der Empfaenger noch existiert
    pub fn ist_offen(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nachricht(i: usize) -> ServerNachricht {
        ServerNachricht::fehler(format!("n{i}"))
    }

    #[tokio::test]
    async fn senden_und_empfangen_in_reihenfolge() {
        let (sender, mut rx) = ClientSender::mit_queue(ConnectionId::new(), 8);

        for i in 0..3 {
            sender.senden(nachricht(i)).unwrap();
        }

        for i in 0..3 {
            assert_eq!(rx.recv().await, Some(nachricht(i)));
        }
    }

    #[test]
    fn volle_queue_verwirft() {
        let (sender, _rx) = ClientSender::mit_queue(ConnectionId::new(), 2);

        sender.senden(nachricht(0)).unwrap();
        sender.senden(nachricht(1)).unwrap();
        assert!(matches!(
            sender.senden(nachricht(2)),
            Err(SignalingError::QueueVoll)
        ));
    }

    #[test]
    fn geschlossene_queue_meldet_sendfehler() {
        let (sender, rx) = ClientSender::mit_queue(ConnectionId::new(), 2);
        assert!(sender.ist_offen());
        drop(rx);

        assert!(!sender.ist_offen());
        assert!(matches!(
            sender.senden(nachricht(0)),
            Err(SignalingError::SendFehler)
        ));
    }

    #[test]
    fn groesse_null_wird_auf_eins_angehoben() {
        let (sender, _rx) = ClientSender::mit_queue(ConnectionId::new(), 0);
        assert!(sender.senden(nachricht(0)).is_ok());
    }
}
