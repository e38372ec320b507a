//! Core data types for quill

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a registered principal, allocated by storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(u64);

impl PrincipalId {
    pub fn new(id: u64) -> Self {
        PrincipalId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PrincipalId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(PrincipalId)
    }
}

/// Identifier of a note, allocated by storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(u64);

impl NoteId {
    pub fn new(id: u64) -> Self {
        NoteId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-note concurrency token.
///
/// Starts at [`Version::INITIAL`] and advances by exactly one per committed
/// update. It is never decremented or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub const INITIAL: Version = Version(1);

    pub fn new(value: u64) -> Self {
        Version(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The version a successful update produces, or `None` on overflow
    pub fn next(self) -> Option<Version> {
        self.0.checked_add(1).map(Version)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration request, validated on construction
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrincipal {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewPrincipal {
    /// Create a registration request with validation
    pub fn new(username: &str, email: &str, password: &str) -> crate::Result<Self> {
        let candidate = NewPrincipal {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        candidate.validate()?;
        Ok(candidate)
    }

    /// Check field shapes (usernames: alphanumeric, '.', '-', '_')
    pub fn validate(&self) -> crate::Result<()> {
        if self.username.is_empty() {
            return Err(crate::QuillError::Validation("username is empty".to_string()));
        }

        if !self
            .username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(crate::QuillError::Validation(format!(
                "invalid characters in username '{}'",
                self.username
            )));
        }

        match self.email.split_once('@') {
            Some((local, domain))
                if !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !self.email.chars().any(char::is_whitespace) => {}
            _ => {
                return Err(crate::QuillError::Validation(format!(
                    "invalid email address '{}'",
                    self.email
                )))
            }
        }

        if self.password.is_empty() {
            return Err(crate::QuillError::Validation("password is empty".to_string()));
        }

        Ok(())
    }
}

/// A registered principal as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Public view without the password digest
    pub fn profile(&self) -> PrincipalProfile {
        PrincipalProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// What callers get to see of a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalProfile {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
}

/// A note owned by exactly one principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub owner_id: PrincipalId,
    pub title: String,
    pub content: String,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create a fresh note at [`Version::INITIAL`]
    pub fn new(id: NoteId, owner_id: PrincipalId, fields: NewNote, now: DateTime<Utc>) -> Self {
        Note {
            id,
            owner_id,
            title: fields.title,
            content: fields.content,
            version: Version::INITIAL,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl NotePatch {
    /// Overlay the provided fields onto a copy of `note`
    pub fn apply_to(&self, note: &Note) -> Note {
        let mut patched = note.clone();
        if let Some(title) = &self.title {
            patched.title = title.clone();
        }
        if let Some(content) = &self.content {
            patched.content = content.clone();
        }
        patched
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}
