//! Maps a raw database violation onto the declaration that explains it.
//!
//! Resolution works in three steps: the class's dialect parser pulls an index
//! name, a column list or a foreign key column out of the driver message; the
//! fragments are turned into canonical keys; and the declaration storages of
//! the class and its ancestors are searched, nearest class first, trying the
//! index key before the column key at every level. The first validator whose
//! guards admit the record attaches its error and resolution stops there.

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    errors::{DatabaseError, DatabaseErrorKind},
    keys::ConstraintKey,
    record::Record,
    registry::Registry,
};

/// Outcome of `Resolver::handle_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// A declaration absorbed the violation into the record's errors.
    Resolved {
        /// Class that made the matching declaration.
        class: String,
        key: ConstraintKey,
    },
    /// Nothing matched; the caller must re-raise the original error.
    Unhandled,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Fragments recovered from a driver message and the keys derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// True when `columns` came from the index catalog rather than the message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub columns_from_catalog: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key_column: Option<String>,
    /// Lookup keys in the order they are tried at each level.
    pub keys: Vec<ConstraintKey>,
}

/// Resolution engine bound to a registry.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    registry: &'r Registry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Tries to turn `error` into validation errors on `record`.
    ///
    /// Errors other than unique and foreign key violations are never touched.
    pub fn handle_error(&self, record: &mut dyn Record, error: &DatabaseError) -> Resolution {
        match error.kind {
            DatabaseErrorKind::RecordNotUnique => self.handle_unique_error(record, error),
            DatabaseErrorKind::InvalidForeignKey => self.handle_foreign_key_error(record, error),
            DatabaseErrorKind::Other => Resolution::Unhandled,
        }
    }

    /// Extracts evidence for `error` as seen from `class`, without touching
    /// any record.
    pub fn evidence(&self, class: &str, error: &DatabaseError) -> Evidence {
        let parser = self.registry.parser_for(class);
        match error.kind {
            DatabaseErrorKind::RecordNotUnique => {
                let extraction = parser.unique_evidence(&error.message);
                let index_name = extraction.index_name().map(str::to_string);
                let mut columns = extraction.columns().to_vec();
                let mut columns_from_catalog = false;
                if columns.is_empty()
                    && let Some(index_name) = &index_name
                    && let Some(catalog_columns) = self.catalog_columns(class, index_name)
                {
                    columns = catalog_columns;
                    columns_from_catalog = true;
                }

                let mut keys = Vec::with_capacity(2);
                if let Some(index_name) = &index_name {
                    keys.push(ConstraintKey::uniqueness_index(index_name));
                }
                let column_key = ConstraintKey::uniqueness(&columns);
                if !column_key.is_bare() {
                    keys.push(column_key);
                }

                Evidence {
                    index_name,
                    columns,
                    columns_from_catalog,
                    foreign_key_column: None,
                    keys,
                }
            }
            DatabaseErrorKind::InvalidForeignKey => {
                let foreign_key_column = parser.foreign_key_error_column(&error.message);
                let keys = foreign_key_column
                    .as_deref()
                    .map(ConstraintKey::belongs_to)
                    .filter(|key| !key.is_bare())
                    .into_iter()
                    .collect();
                Evidence {
                    foreign_key_column,
                    keys,
                    ..Evidence::default()
                }
            }
            DatabaseErrorKind::Other => Evidence::default(),
        }
    }

    fn handle_unique_error(&self, record: &mut dyn Record, error: &DatabaseError) -> Resolution {
        let class = record.class_name().to_string();
        let evidence = self.evidence(&class, error);
        debug!(
            "unique violation on {class}: index {:?}, columns {:?}, keys {:?}",
            evidence.index_name, evidence.columns, evidence.keys
        );

        for (owner, storage) in self.registry.storages(&class) {
            for key in &evidence.keys {
                let Some(validator) = storage.uniqueness(key) else {
                    continue;
                };
                if validator.handle_unique_error(record) {
                    info!("resolved unique violation on {class} via {owner} {key}");
                    return Resolution::Resolved {
                        class: owner,
                        key: key.clone(),
                    };
                }
                debug!("{owner} {key} matched but its guards exclude this {class}");
            }
        }

        warn!("unresolved unique violation on {class}: {}", error.message);
        Resolution::Unhandled
    }

    fn handle_foreign_key_error(&self, record: &mut dyn Record, error: &DatabaseError) -> Resolution {
        let class = record.class_name().to_string();
        let evidence = self.evidence(&class, error);
        debug!(
            "foreign key violation on {class}: column {:?}",
            evidence.foreign_key_column
        );

        for (owner, storage) in self.registry.storages(&class) {
            for key in &evidence.keys {
                let Some(validator) = storage.belongs_to(key) else {
                    continue;
                };
                if validator.handle_foreign_key_error(record) {
                    info!("resolved foreign key violation on {class} via {owner} {key}");
                    return Resolution::Resolved {
                        class: owner,
                        key: key.clone(),
                    };
                }
                debug!("{owner} {key} matched but its guards exclude this {class}");
            }
        }

        warn!("unresolved foreign key violation on {class}: {}", error.message);
        Resolution::Unhandled
    }

    fn catalog_columns(&self, class: &str, index_name: &str) -> Option<Vec<String>> {
        let catalog = self.registry.index_catalog()?;
        let table = self.registry.table_for(class)?;
        catalog.index_columns(&table, index_name)
    }
}

/// Resolves `error` against `registry`; `true` when the record absorbed it.
pub fn handle_error(registry: &Registry, record: &mut dyn Record, error: &DatabaseError) -> bool {
    Resolver::new(registry).handle_error(record, error).is_resolved()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::Dialect,
        record::DynamicRecord,
        registry::{ClassDefinition, RegistryOptions, StaticIndexCatalog},
        types::{BelongsToOptions, UniquenessOptions},
    };
    use serde_json::json;

    const PG_UNIQUE: &str = "ERROR:  duplicate key value violates unique constraint \"index_entities_on_a_and_b\"\n\
        DETAIL:  Key (b, a)=(1, 2) already exists.";

    fn registry() -> Registry {
        let registry = Registry::new(RegistryOptions::new(Dialect::Postgresql));
        registry
            .define(ClassDefinition::new("Entity").table("entities"))
            .unwrap();
        registry.define_class("Child", Some("Entity")).unwrap();
        registry
    }

    #[test]
    fn other_errors_are_never_handled() {
        let registry = registry();
        registry
            .validates_db_uniqueness_of("Entity", UniquenessOptions::new("a").scope(["b"]))
            .unwrap();
        let mut record = DynamicRecord::new("Entity");
        let error = DatabaseError::other(PG_UNIQUE);
        assert_eq!(Resolver::new(&registry).handle_error(&mut record, &error), Resolution::Unhandled);
        assert!(record.errors().is_empty());
    }

    #[test]
    fn column_key_matches_regardless_of_reported_order() {
        let registry = registry();
        registry
            .validates_db_uniqueness_of("Entity", UniquenessOptions::new("a").scope(["b"]))
            .unwrap();
        let mut record = DynamicRecord::new("Entity").with("a", 2).with("b", 1);
        let resolution = Resolver::new(&registry).handle_error(&mut record, &DatabaseError::record_not_unique(PG_UNIQUE));
        assert_eq!(
            resolution,
            Resolution::Resolved {
                class: "Entity".into(),
                key: ConstraintKey::uniqueness(["a", "b"]),
            }
        );
        assert_eq!(record.errors().on("a"), vec!["has already been taken"]);
    }

    #[test]
    fn index_key_is_tried_before_column_key() {
        let registry = registry();
        registry
            .validates_db_uniqueness_of("Entity", UniquenessOptions::new("a").scope(["b"]))
            .unwrap();
        registry
            .validates_db_uniqueness_of(
                "Entity",
                UniquenessOptions::new("b").index_name("index_entities_on_a_and_b"),
            )
            .unwrap();
        let mut record = DynamicRecord::new("Entity");
        let resolution = Resolver::new(&registry).handle_error(&mut record, &DatabaseError::record_not_unique(PG_UNIQUE));
        assert_eq!(
            resolution,
            Resolution::Resolved {
                class: "Entity".into(),
                key: ConstraintKey::uniqueness_index("index_entities_on_a_and_b"),
            }
        );
        assert_eq!(record.errors().on("b").len(), 1);
        assert!(record.errors().on("a").is_empty());
    }

    #[test]
    fn excluded_candidate_falls_through_to_the_next_one() {
        let registry = registry();
        registry
            .validates_db_uniqueness_of(
                "Entity",
                UniquenessOptions::new("b")
                    .index_name("index_entities_on_a_and_b")
                    .if_(|record| record.read_attribute("strict") == Some(json!(true))),
            )
            .unwrap();
        registry
            .validates_db_uniqueness_of("Entity", UniquenessOptions::new("a").scope(["b"]))
            .unwrap();
        let mut record = DynamicRecord::new("Entity").with("strict", false);
        assert!(handle_error(&registry, &mut record, &DatabaseError::record_not_unique(PG_UNIQUE)));
        assert_eq!(record.errors().on("a").len(), 1);
        assert!(record.errors().on("b").is_empty());
    }

    #[test]
    fn subclass_shadows_parent_on_the_same_key() {
        let registry = registry();
        registry
            .validates_db_uniqueness_of("Entity", UniquenessOptions::new("a").scope(["b"]))
            .unwrap();
        registry
            .validates_db_uniqueness_of(
                "Child",
                UniquenessOptions::new("a").scope(["b"]).message("child duplicate"),
            )
            .unwrap();
        let mut record = DynamicRecord::new("Child");
        let resolution = Resolver::new(&registry).handle_error(&mut record, &DatabaseError::record_not_unique(PG_UNIQUE));
        assert!(matches!(resolution, Resolution::Resolved { ref class, .. } if class == "Child"));
        assert_eq!(record.errors().on("a"), vec!["child duplicate"]);
    }

    #[test]
    fn catalog_supplies_columns_for_index_only_dialects() {
        let catalog = StaticIndexCatalog::new().with("entities", "index_entities_on_field", ["field"]);
        let registry = Registry::new(RegistryOptions::new(Dialect::Mysql).with_index_catalog(catalog));
        registry
            .define(ClassDefinition::new("Entity").table("entities"))
            .unwrap();
        registry
            .validates_db_uniqueness_of("Entity", UniquenessOptions::new("field"))
            .unwrap();

        let error = DatabaseError::record_not_unique(
            "Mysql2::Error: Duplicate entry '0' for key 'entities.index_entities_on_field'",
        );
        let resolver = Resolver::new(&registry);
        let evidence = resolver.evidence("Entity", &error);
        assert!(evidence.columns_from_catalog);
        assert_eq!(
            evidence.keys,
            vec![
                ConstraintKey::uniqueness_index("index_entities_on_field"),
                ConstraintKey::uniqueness(["field"]),
            ]
        );

        let mut record = DynamicRecord::new("Entity").with("field", 0);
        assert!(resolver.handle_error(&mut record, &error).is_resolved());
        assert_eq!(record.errors().len(), 1);
    }

    #[test]
    fn unparseable_messages_are_unhandled() {
        let registry = registry();
        registry
            .validates_db_uniqueness_of("Entity", UniquenessOptions::new("field"))
            .unwrap();
        let mut record = DynamicRecord::new("Entity");
        let error = DatabaseError::record_not_unique("something the parser has never seen");
        assert!(Resolver::new(&registry).evidence("Entity", &error).keys.is_empty());
        assert!(!handle_error(&registry, &mut record, &error));
    }

    #[test]
    fn foreign_key_resolves_to_association() {
        let registry = registry();
        registry
            .db_belongs_to("Entity", BelongsToOptions::new("company"))
            .unwrap();
        let error = DatabaseError::invalid_foreign_key(
            "ERROR:  insert or update on table \"entities\" violates foreign key constraint \"fk_rails_1\"\n\
             DETAIL:  Key (company_id)=(2) is not present in table \"companies\".",
        );
        let mut record = DynamicRecord::new("Child").with("company_id", 2);
        let resolution = Resolver::new(&registry).handle_error(&mut record, &error);
        assert_eq!(
            resolution,
            Resolution::Resolved {
                class: "Entity".into(),
                key: ConstraintKey::belongs_to("company_id"),
            }
        );
        assert_eq!(record.errors().on("company"), vec!["must exist"]);
    }

    #[test]
    fn undefined_classes_resolve_nothing() {
        let registry = registry();
        let mut record = DynamicRecord::new("Stranger");
        assert!(!handle_error(&registry, &mut record, &DatabaseError::record_not_unique(PG_UNIQUE)));
    }
}
