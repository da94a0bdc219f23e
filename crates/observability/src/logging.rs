//! Structured Logging Setup via tracing-subscriber
//!
//! Level und Format kommen aus der Konfiguration und koennen per
//! Umgebungsvariable ueberschrieben werden:
//! - `RZ_LOG_LEVEL`: EnvFilter-Direktive (z.B. `debug` oder
//!   `info,rendezvous_signaling=trace`)
//! - `RZ_LOG_FORMAT`: `text` oder `json`
//!
//! Verbindungs-IDs und Namen werden als strukturierte Felder geloggt.

use tracing_subscriber::{fmt, EnvFilter};

/// Name der Umgebungsvariable fuer den Log-Level
pub const ENV_LOG_LEVEL: &str = "RZ_LOG_LEVEL";
/// Name der Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "RZ_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Unbekannte Werte fallen auf `Text` zurueck
    pub fn aus_str(format: &str) -> Self {
        match format {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor den uebergebenen Werten.
/// Ein bereits installierter Subscriber (z.B. in Tests) wird nicht ersetzt.
pub fn logging_initialisieren(level: &str, format: &str) {
    let direktive = effektive_direktive(std::env::var(ENV_LOG_LEVEL).ok(), level);
    let filter = EnvFilter::try_new(&direktive).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = LogFormat::aus_str(
        &std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| format.to_string()),
    );

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}

/// Waehlt die Filter-Direktive: gesetzte Umgebung vor Konfiguration.
///
/// Eine leere Umgebungsvariable zaehlt als nicht gesetzt.
pub fn effektive_direktive(aus_env: Option<String>, aus_config: &str) -> String {
    match aus_env {
        Some(wert) if !wert.trim().is_empty() => wert,
        _ => aus_config.to_string(),
    }
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert_eq!(LogFormat::aus_str("json"), LogFormat::Json);
        assert_eq!(LogFormat::aus_str("JSON"), LogFormat::Text);
    }

    #[test]
    fn env_hat_vorrang() {
        assert_eq!(effektive_direktive(Some("debug".into()), "info"), "debug");
    }

    #[test]
    fn leere_env_faellt_auf_config_zurueck() {
        assert_eq!(effektive_direktive(Some("  ".into()), "warn"), "warn");
        assert_eq!(effektive_direktive(None, "warn"), "warn");
    }

    #[test]
    fn doppelte_initialisierung_paniked_nicht() {
        logging_initialisieren("info", "text");
        logging_initialisieren("debug", "json");
    }
}
