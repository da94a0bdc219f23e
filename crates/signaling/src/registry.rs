//! Connection-Registry – Welcher Name gehoert welcher Verbindung?
//!
//! Prozessweite Abbildung Name -> Send-Queue der haltenden Session.
//!
//! ## Invarianten
//! - Ein Name ist genau dann eingetragen, wenn genau eine lebende Session
//!   ihn erfolgreich beansprucht hat
//! - `beanspruchen` ist linearisierbar: von mehreren gleichzeitigen Versuchen
//!   fuer denselben Namen gewinnt genau einer
//! - Nur der Halter kann freigeben; fremde oder doppelte Freigaben sind No-ops
//!
//! Ein einziger Mutex schuetzt die Map. Kritische Abschnitte enthalten nur
//! Map-Zugriffe, nie I/O.

use parking_lot::Mutex;
use rendezvous_core::{ConnectionId, Username};
use rendezvous_observability::RendezvousMetrics;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SignalingError, SignalingResult};
use crate::sender::ClientSender;

/// Eintrag eines beanspruchten Namens
#[derive(Debug)]
struct RegistryEintrag {
    connection_id: ConnectionId,
    sender: ClientSender,
}

/// Prozessweite Namens-Registry
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<Username, RegistryEintrag>>>,
    metriken: Option<RendezvousMetrics>,
}

impl ConnectionRegistry {
    /// Erstellt eine leere Registry ohne Metriken
    pub fn neu() -> Self {
        Self::default()
    }

    /// Erstellt eine leere Registry, die `rendezvous_registered_names` pflegt
    pub fn mit_metriken(metriken: RendezvousMetrics) -> Self {
        Self {
            inner: Arc::default(),
            metriken: Some(metriken),
        }
    }

    /// Beansprucht `name` fuer die Verbindung hinter `sender`
    ///
    /// Bei Erfolg haelt der zurueckgegebene [`NamensClaim`] den Namen, bis er
    /// gedroppt wird. Ist der Name vergeben, wird nichts veraendert.
    pub fn beanspruchen(
        &self,
        name: Username,
        sender: ClientSender,
    ) -> SignalingResult<NamensClaim> {
        let connection_id = sender.connection_id();

        {
            let mut map = self.inner.lock();
            match map.entry(name.clone()) {
                Entry::Occupied(_) => return Err(SignalingError::NameTaken(name)),
                Entry::Vacant(frei) => {
                    frei.insert(RegistryEintrag {
                        connection_id,
                        sender,
                    });
                }
            }
            // Gauge unter dem Lock setzen, sonst ueberholen sich parallele Claims
            self.gauge_setzen(map.len());
        }

        tracing::debug!(name = %name, connection_id = %connection_id, "Name beansprucht");

        Ok(NamensClaim {
            registry: self.clone(),
            name,
            connection_id,
        })
    }

    /// Gibt die Send-Queue des aktuellen Halters zurueck
    pub fn nachschlagen(&self, name: &str) -> Option<ClientSender> {
        self.inner.lock().get(name).map(|e| e.sender.clone())
    }

    /// Entfernt `name`, falls `connection_id` der aktuelle Halter ist
    ///
    /// Gibt `true` zurueck wenn tatsaechlich ein Eintrag entfernt wurde.
    pub fn freigeben(&self, name: &Username, connection_id: ConnectionId) -> bool {
        let entfernt = {
            let mut map = self.inner.lock();
            match map.get(name) {
                Some(eintrag) if eintrag.connection_id == connection_id => {
                    map.remove(name);
                    self.gauge_setzen(map.len());
                    true
                }
                _ => false,
            }
        };

        if entfernt {
            tracing::debug!(name = %name, connection_id = %connection_id, "Name freigegeben");
        }
        entfernt
    }

    /// Prueft ob ein Name aktuell vergeben ist
    pub fn ist_registriert(&self, name: &str) -> bool {
        self.inner.lock().contains_key(name)
    }

    /// Gibt die Anzahl der vergebenen Namen zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.lock().len()
    }

    /// Nur mit gehaltenem Lock aufrufen
    fn gauge_setzen(&self, anzahl: usize) {
        if let Some(metriken) = &self.metriken {
            metriken.registered_names.set(anzahl as i64);
        }
    }
}

// ---------------------------------------------------------------------------
// NamensClaim
// ---------------------------------------------------------------------------

/// Besitz eines Namens in der Registry
///
/// Wird der Claim gedroppt, gibt er den Namen frei. Damit ist die Freigabe
/// auf jedem Ausstiegspfad der Session garantiert, auch bei Panics.
#[derive(Debug)]
pub struct NamensClaim {
    registry: ConnectionRegistry,
    name: Username,
    connection_id: ConnectionId,
}

impl NamensClaim {
    pub fn name(&self) -> &Username {
        &self.name
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl Drop for NamensClaim {
    fn drop(&mut self) {
        self.registry.freigeben(&self.name, self.connection_id);
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("anzahl", &self.anzahl())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
