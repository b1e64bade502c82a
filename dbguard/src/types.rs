use std::{fmt, sync::Arc};

use serde::Serialize;

use crate::{keys::ConstraintKey, record::Record};

/// Guard evaluated against the record being saved.
pub type Predicate = Arc<dyn Fn(&dyn Record) -> bool + Send + Sync>;

/// `if` / `unless` guards attached to a declaration.
///
/// A declaration applies when every `if` guard holds and no `unless` guard
/// does. With no guards it always applies.
#[derive(Clone, Default)]
pub struct Conditions {
    if_guards: Vec<Predicate>,
    unless_guards: Vec<Predicate>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_if<F>(&mut self, guard: F)
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.if_guards.push(Arc::new(guard));
    }

    pub fn push_unless<F>(&mut self, guard: F)
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.unless_guards.push(Arc::new(guard));
    }

    pub fn applies(&self, record: &dyn Record) -> bool {
        self.if_guards.iter().all(|guard| guard(record)) && !self.unless_guards.iter().any(|guard| guard(record))
    }

    pub fn is_empty(&self) -> bool {
        self.if_guards.is_empty() && self.unless_guards.is_empty()
    }
}

impl fmt::Debug for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conditions")
            .field("if", &self.if_guards.len())
            .field("unless", &self.unless_guards.len())
            .finish()
    }
}

/// Declaration of a database-enforced uniqueness constraint.
///
/// ```text
/// // validates_db_uniqueness_of :slug, scope: :tenant_id, case_sensitive: false
/// UniquenessOptions::new("slug").scope(["tenant_id"]).case_sensitive(false)
/// ```
#[derive(Debug, Clone)]
pub struct UniquenessOptions {
    /// Attribute the error is attached to.
    pub attribute: String,
    /// Additional columns covered by the same unique index.
    pub scope: Vec<String>,
    /// Name of the backing index, when known.
    pub index_name: Option<String>,
    /// Custom message template, overriding "has already been taken".
    pub message: Option<String>,
    pub case_sensitive: bool,
    pub conditions: Conditions,
}

impl UniquenessOptions {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            scope: Vec::new(),
            index_name: None,
            message: None,
            case_sensitive: true,
            conditions: Conditions::new(),
        }
    }

    pub fn scope<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn if_<F>(mut self, guard: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.conditions.push_if(guard);
        self
    }

    pub fn unless<F>(mut self, guard: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.conditions.push_unless(guard);
        self
    }

    /// Attribute plus scope columns: the full column set of the index.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(self.attribute.clone())
            .chain(self.scope.iter().cloned())
            .collect()
    }

    /// Key the declaration is stored under. An explicit index name wins over
    /// the column set.
    pub fn key(&self) -> ConstraintKey {
        match &self.index_name {
            Some(index_name) => ConstraintKey::uniqueness_index(index_name),
            None => ConstraintKey::uniqueness(self.columns()),
        }
    }
}

/// Declaration of a database-enforced `belongs_to` reference.
#[derive(Debug, Clone)]
pub struct BelongsToOptions {
    /// Association name the error is attached to (e.g. `company`).
    pub association: String,
    /// Foreign key column; defaults to `<association>_id`.
    pub foreign_key: Option<String>,
    /// Custom message template, overriding "must exist".
    pub message: Option<String>,
    pub conditions: Conditions,
}

impl BelongsToOptions {
    pub fn new(association: impl Into<String>) -> Self {
        Self {
            association: association.into(),
            foreign_key: None,
            message: None,
            conditions: Conditions::new(),
        }
    }

    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn if_<F>(mut self, guard: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.conditions.push_if(guard);
        self
    }

    pub fn unless<F>(mut self, guard: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.conditions.push_unless(guard);
        self
    }

    pub fn foreign_key_column(&self) -> String {
        self.foreign_key
            .clone()
            .unwrap_or_else(|| format!("{}_id", self.association))
    }

    pub fn key(&self) -> ConstraintKey {
        ConstraintKey::belongs_to(&self.foreign_key_column())
    }
}

/// Serializable summary of a declared validator, used by enumeration APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorSummary {
    /// Class the declaration was made on.
    pub class: String,
    pub kind: &'static str,
    pub key: String,
    pub attribute: String,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    pub conditional: bool,
}
