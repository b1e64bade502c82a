//! Validators that turn a resolved database violation into an attribute error.

use log::debug;
use serde_json::Value;

use crate::{
    errors::DeclarationError,
    keys::{ConstraintKey, unify_columns},
    record::Record,
    types::{BelongsToOptions, UniquenessOptions, ValidatorSummary},
};

pub const TAKEN_CODE: &str = "taken";
pub const DEFAULT_TAKEN_MESSAGE: &str = "has already been taken";
pub const REQUIRED_CODE: &str = "required";
pub const DEFAULT_REQUIRED_MESSAGE: &str = "must exist";

/// Uniqueness constraint declared on a class and enforced by a unique index.
#[derive(Debug)]
pub struct UniquenessValidator {
    class: String,
    key: ConstraintKey,
    options: UniquenessOptions,
}

impl UniquenessValidator {
    pub fn new(class: impl Into<String>, mut options: UniquenessOptions) -> Result<Self, DeclarationError> {
        let class = class.into();
        options.attribute = options.attribute.trim().to_string();
        if options.attribute.is_empty() {
            return Err(DeclarationError::EmptyColumns { class });
        }
        options.index_name = options
            .index_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let key = options.key();
        Ok(Self { class, key, options })
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn key(&self) -> &ConstraintKey {
        &self.key
    }

    pub fn attribute(&self) -> &str {
        &self.options.attribute
    }

    /// Normalized column set covered by the index.
    pub fn columns(&self) -> Vec<String> {
        unify_columns(self.options.columns())
    }

    pub fn index_name(&self) -> Option<&str> {
        self.options.index_name.as_deref()
    }

    pub fn case_sensitive(&self) -> bool {
        self.options.case_sensitive
    }

    pub fn options(&self) -> &UniquenessOptions {
        &self.options
    }

    /// Whether the `if`/`unless` guards admit `record`.
    pub fn applies_to(&self, record: &dyn Record) -> bool {
        self.options.conditions.applies(record)
    }

    /// Attaches a `taken` error to the declared attribute.
    ///
    /// Returns `false` without touching the record when the guards exclude it.
    pub fn handle_unique_error(&self, record: &mut dyn Record) -> bool {
        if !self.applies_to(record) {
            debug!(
                "uniqueness validator {} on {} does not apply to this {}",
                self.key,
                self.class,
                record.class_name()
            );
            return false;
        }

        let attribute = self.attribute();
        let value = record.read_attribute(attribute);
        let message = match &self.options.message {
            Some(template) => interpolate(template, attribute, value.as_ref(), record.class_name()),
            None => DEFAULT_TAKEN_MESSAGE.to_string(),
        };
        record.errors_mut().add(attribute, TAKEN_CODE, message);
        true
    }

    pub fn summary(&self) -> ValidatorSummary {
        ValidatorSummary {
            class: self.class.clone(),
            kind: "uniqueness",
            key: self.key.to_string(),
            attribute: self.options.attribute.clone(),
            columns: self.columns(),
            index_name: self.options.index_name.clone(),
            message: self.options.message.clone(),
            case_sensitive: Some(self.options.case_sensitive),
            conditional: !self.options.conditions.is_empty(),
        }
    }
}

/// Presence of a `belongs_to` association, enforced by a foreign key.
#[derive(Debug)]
pub struct BelongsToPresenceValidator {
    class: String,
    key: ConstraintKey,
    foreign_key: String,
    options: BelongsToOptions,
}

impl BelongsToPresenceValidator {
    pub fn new(class: impl Into<String>, mut options: BelongsToOptions) -> Result<Self, DeclarationError> {
        let class = class.into();
        options.association = options.association.trim().to_string();
        if options.association.is_empty() {
            return Err(DeclarationError::EmptyColumns { class });
        }
        let foreign_key = options.foreign_key_column().trim().to_string();
        if foreign_key.is_empty() {
            return Err(DeclarationError::EmptyColumns { class });
        }
        let key = ConstraintKey::belongs_to(&foreign_key);
        Ok(Self {
            class,
            key,
            foreign_key,
            options,
        })
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn key(&self) -> &ConstraintKey {
        &self.key
    }

    pub fn association(&self) -> &str {
        &self.options.association
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn options(&self) -> &BelongsToOptions {
        &self.options
    }

    pub fn applies_to(&self, record: &dyn Record) -> bool {
        self.options.conditions.applies(record)
    }

    /// Attaches a `required` ("must exist") error to the association.
    pub fn handle_foreign_key_error(&self, record: &mut dyn Record) -> bool {
        if !self.applies_to(record) {
            debug!(
                "belongs_to validator {} on {} does not apply to this {}",
                self.key,
                self.class,
                record.class_name()
            );
            return false;
        }

        let association = self.association();
        let value = record.read_attribute(&self.foreign_key);
        let message = match &self.options.message {
            Some(template) => interpolate(template, association, value.as_ref(), record.class_name()),
            None => DEFAULT_REQUIRED_MESSAGE.to_string(),
        };
        record.errors_mut().add(association, REQUIRED_CODE, message);
        true
    }

    pub fn summary(&self) -> ValidatorSummary {
        ValidatorSummary {
            class: self.class.clone(),
            kind: "belongs_to",
            key: self.key.to_string(),
            attribute: self.options.association.clone(),
            columns: vec![self.foreign_key.clone()],
            index_name: None,
            message: self.options.message.clone(),
            case_sensitive: None,
            conditional: !self.options.conditions.is_empty(),
        }
    }
}

/// Fills `%{attribute}`, `%{value}` and `%{model}` placeholders.
pub fn interpolate(template: &str, attribute: &str, value: Option<&Value>, model: &str) -> String {
    let value = match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    template
        .replace("%{attribute}", &humanize(attribute))
        .replace("%{value}", &value)
        .replace("%{model}", model)
}

fn humanize(attribute: &str) -> String {
    let spaced = attribute.trim_end_matches("_id").replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
