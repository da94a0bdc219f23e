//! Gemeinsame Identifikationstypen fuer Rendezvous
//!
//! Newtypes verhindern, dass eine Verbindungs-ID mit einem Benutzernamen
//! verwechselt wird.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RendezvousError;

/// Eindeutige ID einer einzelnen WebSocket-Verbindung
///
/// Wird bei jedem akzeptierten Upgrade neu vergeben und nie wiederverwendet.
/// Die Registry prueft damit, ob eine Freigabe vom tatsaechlichen Halter kommt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Vom Client gewaehlter Name (case-sensitiv, nie leer)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Prueft und erstellt einen Benutzernamen
    pub fn neu(name: impl Into<String>) -> Result<Self, RendezvousError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RendezvousError::UngueltigerName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = RendezvousError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::neu(name)
    }
}

impl From<Username> for String {
    fn from(name: Username) -> Self {
        name.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_sind_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn:"));
    }

    #[test]
    fn leerer_name_wird_abgelehnt() {
        assert!(Username::neu("").is_err());
        assert!(serde_json::from_str::<Username>("\"\"").is_err());
    }

    #[test]
    fn name_ist_case_sensitiv() {
        let klein = Username::neu("alice").unwrap();
        let gross = Username::neu("Alice").unwrap();
        assert_ne!(klein, gross);
        assert_eq!(klein.as_str(), "alice");
    }

    #[test]
    fn name_serde_als_string() {
        let name: Username = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(name.to_string(), "bob");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"bob\"");
    }
}
