//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Registry, Router und Metriken sowie den Shutdown-Kanal, der an
//! jede Session verteilt wird.

use rendezvous_observability::RendezvousMetrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

use crate::dispatcher::MessageRouter;
use crate::registry::ConnectionRegistry;
use crate::sender::SEND_QUEUE_GROESSE;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen (0 = unbegrenzt)
    pub max_clients: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Kapazitaet der Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
    /// Maximale Dauer eines einzelnen Socket-Writes
    pub sende_timeout_ms: u64,
    /// Maximale Groesse eines eingehenden Frames
    pub max_frame_bytes: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 1024,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            sende_queue_groesse: SEND_QUEUE_GROESSE,
            sende_timeout_ms: 5000,
            max_frame_bytes: 256 * 1024,
        }
    }
}

impl SignalingConfig {
    pub fn keepalive_intervall(&self) -> Duration {
        Duration::from_secs(self.keepalive_sek.max(1))
    }

    pub fn verbindungs_timeout(&self) -> Duration {
        Duration::from_secs(self.verbindungs_timeout_sek.max(1))
    }

    pub fn sende_timeout(&self) -> Duration {
        Duration::from_millis(self.sende_timeout_ms.max(1))
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    pub registry: ConnectionRegistry,
    pub router: MessageRouter,
    pub metriken: RendezvousMetrics,
    aktive_sessions: AtomicUsize,
    shutdown_tx: watch::Sender<bool>,
    /// Weckt Wartende, sobald die letzte Session endet
    leer: Notify,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: RendezvousMetrics) -> Arc<Self> {
        let registry = ConnectionRegistry::mit_metriken(metriken.clone());
        let router = MessageRouter::neu(registry.clone(), metriken.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            config: Arc::new(config),
            registry,
            router,
            metriken,
            aktive_sessions: AtomicUsize::new(0),
            shutdown_tx,
            leer: Notify::new(),
        })
    }

    /// Anzahl der aktuell offenen Sessions
    pub fn aktive_sessions(&self) -> usize {
        self.aktive_sessions.load(Ordering::Acquire)
    }

    /// Reserviert einen Verbindungsplatz
    ///
    /// `None` wenn `max_clients` erreicht ist oder der Server herunterfaehrt.
    /// Der Platz wird beim Drop des [`SessionSlot`] zurueckgegeben.
    pub fn slot_reservieren(self: &Arc<Self>) -> Option<SessionSlot> {
        if self.faehrt_herunter() {
            return None;
        }

        let max = self.config.max_clients;
        let mut aktuell = self.aktive_sessions.load(Ordering::Acquire);
        loop {
            if max > 0 && aktuell >= max {
                return None;
            }
            match self.aktive_sessions.compare_exchange_weak(
                aktuell,
                aktuell + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(neu) => aktuell = neu,
            }
        }

        self.metriken.active_sessions.inc();
        Some(SessionSlot {
            state: Arc::clone(self),
        })
    }

    /// Signalisiert allen Sessions das Herunterfahren
    pub fn herunterfahren(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn faehrt_herunter(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Empfaenger fuer das Shutdown-Signal einer Session
    pub fn shutdown_empfaenger(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Wartet bis alle Sessions beendet sind, hoechstens `timeout`
    ///
    /// Gibt `true` zurueck wenn keine Session mehr offen ist.
    pub async fn auf_sessions_warten(&self, timeout: Duration) -> bool {
        let warten = async {
            loop {
                let benachrichtigt = self.leer.notified();
                tokio::pin!(benachrichtigt);
                // Vor dem Pruefen registrieren, sonst geht ein Drop dazwischen verloren
                benachrichtigt.as_mut().enable();
                if self.aktive_sessions() == 0 {
                    return;
                }
                benachrichtigt.await;
            }
        };

        match tokio::time::timeout(timeout, warten).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    offen = self.aktive_sessions(),
                    "Nicht alle Sessions rechtzeitig beendet"
                );
                false
            }
        }
    }
}

/// Belegter Verbindungsplatz, gibt sich beim Drop frei
pub struct SessionSlot {
    state: Arc<SignalingState>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        let vorher = self.state.aktive_sessions.fetch_sub(1, Ordering::AcqRel);
        self.state.metriken.active_sessions.dec();
        if vorher == 1 {
            self.state.leer.notify_waiters();
        }
    }
}
