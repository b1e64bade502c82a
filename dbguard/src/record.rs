//! The narrow slice of an ORM object the resolver needs.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::Errors;

/// An active-record-like object: it knows its class, can read attributes and
/// owns an error collection.
pub trait Record {
    /// Name of the class the object was instantiated from. Used to locate the
    /// declaration storage and walk its ancestors.
    fn class_name(&self) -> &str;

    fn read_attribute(&self, name: &str) -> Option<Value>;

    fn errors(&self) -> &Errors;

    fn errors_mut(&mut self) -> &mut Errors;
}

/// Schemaless record backed by a JSON map. Handy for tooling and tests where
/// no concrete model type exists.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DynamicRecord {
    class: String,
    attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Errors::is_empty")]
    errors: Errors,
}

impl DynamicRecord {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            attributes: Map::new(),
            errors: Errors::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

impl Record for DynamicRecord {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn read_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    fn errors(&self) -> &Errors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }
}
