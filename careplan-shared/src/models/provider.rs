use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A prescribing provider, keyed by National Provider Identifier (NPI).
/// NPI and name are one-to-one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provider {
    pub id: Uuid,
    pub npi: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    pub fn new(npi: String, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            npi,
            name,
            created_at: Utc::now(),
        }
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "npi": self.npi,
            "name": self.name,
            "created_at": self.created_at.to_rfc3339(),
        })
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (NPI: {})", self.name, self.npi)
    }
}
