use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A patient, keyed by medical record number (MRN).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patient {
    pub id: Uuid,
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(mrn: String, first_name: String, last_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mrn,
            first_name,
            last_name,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive comparison of both name parts.
    pub fn name_matches(&self, first_name: &str, last_name: &str) -> bool {
        self.first_name.to_lowercase() == first_name.to_lowercase()
            && self.last_name.to_lowercase() == last_name.to_lowercase()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Snapshot attached to duplicate findings.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "mrn": self.mrn,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "created_at": self.created_at.to_rfc3339(),
        })
    }
}

impl std::fmt::Display for Patient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.first_name, self.last_name, self.mrn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_display() {
        let patient = Patient::new("123456".into(), "John".into(), "Doe".into());
        assert_eq!(patient.to_string(), "John Doe (123456)");
    }

    #[test]
    fn test_name_matches_ignores_case() {
        let patient = Patient::new("123456".into(), "John".into(), "Doe".into());
        assert!(patient.name_matches("JOHN", "doe"));
        assert!(!patient.name_matches("Jane", "Doe"));
    }
}
