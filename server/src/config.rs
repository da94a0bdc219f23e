//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use rendezvous_core::RendezvousError;
use rendezvous_observability::logging::log_format_gueltig;
use rendezvous_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Signaling-Einstellungen (Keepalive, Queues)
    pub signaling: SignalingEinstellungen,
    /// HTTP-Einstellungen (CORS)
    pub http: HttpEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen (0 = unbegrenzt)
    pub max_clients: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Rendezvous".into(),
            max_clients: 1024,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

/// Signaling-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Inaktivitaets-Timeout in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Kapazitaet der Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
    /// Zeitlimit fuer einen Socket-Write in Millisekunden
    pub sende_timeout_ms: u64,
    /// Maximale Groesse eines eingehenden Frames in Bytes
    pub max_frame_bytes: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        let basis = SignalingConfig::default();
        Self {
            keepalive_sek: basis.keepalive_sek,
            verbindungs_timeout_sek: basis.verbindungs_timeout_sek,
            sende_queue_groesse: basis.sende_queue_groesse,
            sende_timeout_ms: basis.sende_timeout_ms,
            max_frame_bytes: basis.max_frame_bytes,
        }
    }
}

/// HTTP-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEinstellungen {
    /// Erlaubte CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder EnvFilter-Direktive
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Parst eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(inhalt)
    }

    /// Prueft Werte, die sich nicht per Typ ausdruecken lassen
    pub fn validieren(&self) -> Result<(), RendezvousError> {
        self.bind_adresse()?;
        if self.signaling.verbindungs_timeout_sek < self.signaling.keepalive_sek {
            return Err(RendezvousError::Konfiguration(format!(
                "verbindungs_timeout_sek ({}) kleiner als keepalive_sek ({})",
                self.signaling.verbindungs_timeout_sek, self.signaling.keepalive_sek
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(RendezvousError::Konfiguration(format!(
                "Unbekanntes Log-Format '{}' (erlaubt: text, json)",
                self.logging.format
            )));
        }
        if self.signaling.max_frame_bytes == 0 {
            return Err(RendezvousError::Konfiguration(
                "max_frame_bytes darf nicht 0 sein".into(),
            ));
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> Result<SocketAddr, RendezvousError> {
        let text = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port);
        text.parse().map_err(|e| {
            RendezvousError::Konfiguration(format!("Ungueltige Bind-Adresse '{text}': {e}"))
        })
    }

    /// Leitet die Signaling-Konfiguration ab
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_clients: self.server.max_clients,
            keepalive_sek: self.signaling.keepalive_sek,
            verbindungs_timeout_sek: self.signaling.verbindungs_timeout_sek,
            sende_queue_groesse: self.signaling.sende_queue_groesse,
            sende_timeout_ms: self.signaling.sende_timeout_ms,
            max_frame_bytes: self.signaling.max_frame_bytes,
        }
    }
}
