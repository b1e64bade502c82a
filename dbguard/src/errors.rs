use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a raw database failure as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseErrorKind {
    /// A write collided with a unique index.
    RecordNotUnique,
    /// A write referenced a row that does not exist.
    InvalidForeignKey,
    /// Anything else. Never intercepted.
    Other,
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatabaseErrorKind::RecordNotUnique => "record not unique",
            DatabaseErrorKind::InvalidForeignKey => "invalid foreign key",
            DatabaseErrorKind::Other => "database error",
        };
        f.write_str(name)
    }
}

const UNIQUE_FRAGMENTS: &[&str] = &[
    "duplicate key value violates unique constraint",
    "UniqueViolation",
    "Duplicate entry",
    "UNIQUE constraint failed",
];

const FOREIGN_KEY_FRAGMENTS: &[&str] = &[
    "violates foreign key constraint",
    "ForeignKeyViolation",
    "a foreign key constraint fails",
    "FOREIGN KEY constraint failed",
];

/// Raw error raised by the database driver when a write is rejected.
///
/// Only the kind and the driver message are available; everything else has
/// to be recovered from the message text by a dialect parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn record_not_unique(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::RecordNotUnique, message)
    }

    pub fn invalid_foreign_key(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::InvalidForeignKey, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Other, message)
    }

    /// Builds an error from an SQLSTATE code: `23505` is a unique violation,
    /// `23503` a foreign key violation, anything else is `Other`.
    pub fn from_sqlstate(code: &str, message: impl Into<String>) -> Self {
        let kind = match code {
            "23505" => DatabaseErrorKind::RecordNotUnique,
            "23503" => DatabaseErrorKind::InvalidForeignKey,
            _ => DatabaseErrorKind::Other,
        };
        Self::new(kind, message)
    }

    /// Guesses the kind from well-known driver message fragments.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if UNIQUE_FRAGMENTS.iter().any(|fragment| message.contains(fragment)) {
            DatabaseErrorKind::RecordNotUnique
        } else if FOREIGN_KEY_FRAGMENTS.iter().any(|fragment| message.contains(fragment)) {
            DatabaseErrorKind::InvalidForeignKey
        } else {
            DatabaseErrorKind::Other
        };
        Self::new(kind, message)
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::RecordNotUnique | DatabaseErrorKind::InvalidForeignKey
        )
    }
}

/// Problems detected while registering declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("declaration on '{class}' names no columns")]
    EmptyColumns { class: String },

    #[error("'{class}' already declares a validator under key '{key}'")]
    DuplicateKey { class: String, key: String },

    #[error("class '{class}' is not defined")]
    UnknownClass { class: String },

    #[error("class '{class}' is already defined with parent {existing:?}, not {requested:?}")]
    ParentMismatch {
        class: String,
        existing: Option<String>,
        requested: Option<String>,
    },

    #[error("defining '{class}' would create an inheritance cycle")]
    InheritanceCycle { class: String },
}

/// Outcome of a strict save.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The record failed validation, either in the application checks or
    /// because a database violation was resolved into attribute errors.
    #[error("record invalid: {0}")]
    Invalid(#[from] ValidationError),

    /// The database rejected the write for a reason no declaration explains.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Failures while loading or applying a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

/// Collection of validation issues, surfaced by strict saves.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Detailed validation failure for a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Per-instance error collection the validators write into.
///
/// Adding an entry identical to one already present is a no-op, so handling
/// the same violation twice leaves a single entry behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Errors {
    issues: Vec<ValidationIssue>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an error. Returns `false` if the exact entry was already present.
    pub fn add(&mut self, field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> bool {
        let issue = ValidationIssue::new(field, code, message);
        if self.issues.contains(&issue) {
            return false;
        }
        self.issues.push(issue);
        true
    }

    /// Messages attached to `field`, in insertion order.
    pub fn on(&self, field: &str) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|issue| issue.field == field)
            .map(|issue| issue.message.as_str())
            .collect()
    }

    pub fn has_code(&self, field: &str, code: &str) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.field == field && issue.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn clear(&mut self) {
        self.issues.clear();
    }

    pub fn to_validation_error(&self) -> ValidationError {
        ValidationError::new(self.issues.iter().cloned())
    }
}

impl From<Errors> for ValidationError {
    fn from(errors: Errors) -> Self {
        ValidationError::new(errors.issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_classification() {
        assert_eq!(
            DatabaseError::from_sqlstate("23505", "dup").kind,
            DatabaseErrorKind::RecordNotUnique
        );
        assert_eq!(
            DatabaseError::from_sqlstate("23503", "fk").kind,
            DatabaseErrorKind::InvalidForeignKey
        );
        assert_eq!(DatabaseError::from_sqlstate("40001", "retry").kind, DatabaseErrorKind::Other);
    }

    #[test]
    fn message_classification() {
        let pg = DatabaseError::classify(
            "ERROR:  duplicate key value violates unique constraint \"index_entities_on_field\"",
        );
        assert_eq!(pg.kind, DatabaseErrorKind::RecordNotUnique);

        let sqlite = DatabaseError::classify("FOREIGN KEY constraint failed");
        assert_eq!(sqlite.kind, DatabaseErrorKind::InvalidForeignKey);

        let other = DatabaseError::classify("connection reset by peer");
        assert_eq!(other.kind, DatabaseErrorKind::Other);
        assert!(!other.is_constraint_violation());
    }

    #[test]
    fn identical_entries_are_not_duplicated() {
        let mut errors = Errors::new();
        assert!(errors.add("field", "taken", "has already been taken"));
        assert!(!errors.add("field", "taken", "has already been taken"));
        assert!(errors.add("field", "taken", "is in use"));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.on("field"), vec!["has already been taken", "is in use"]);
        assert!(errors.has_code("field", "taken"));
    }

    #[test]
    fn errors_convert_into_validation_error() {
        let mut errors = Errors::new();
        errors.add("company", "required", "must exist");
        let validation: ValidationError = errors.into();
        assert_eq!(validation.issues.len(), 1);
        assert_eq!(validation.issues[0].field, "company");
    }
}
