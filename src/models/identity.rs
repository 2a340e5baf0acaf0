//! Authenticated identity model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated subject of a request
///
/// Produced once per successfully authenticated request and never mutated
/// afterwards; handlers receive it through request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject_id: i64,
    display_name: String,
    issued_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(subject_id: i64, display_name: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            display_name: display_name.into(),
            issued_at,
        }
    }

    pub fn subject_id(&self) -> i64 {
        self.subject_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// When the credential backing this identity was issued
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Same subject and display name, ignoring issue time
    pub fn same_subject(&self, other: &Identity) -> bool {
        self.subject_id == other.subject_id && self.display_name == other.display_name
    }
}

/// A user record as held by the identity store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl UserRecord {
    /// Build the identity this record authenticates as
    pub fn to_identity(&self, issued_at: DateTime<Utc>) -> Identity {
        Identity::new(self.id, self.name.clone(), issued_at)
    }
}
