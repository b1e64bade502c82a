//! In-memory tables that enforce unique indexes and foreign keys and report
//! violations with the message text each real driver produces.

#![allow(dead_code)]

use std::collections::HashMap;

use dbguard::{
    ClassDefinition, DatabaseError, Dialect, DynamicRecord, Persistence, Record, Registry, RegistryOptions,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
struct UniqueIndex {
    name: String,
    columns: Vec<String>,
}

#[derive(Debug, Clone)]
struct ForeignKey {
    name: String,
    column: String,
    references: String,
}

#[derive(Debug, Clone, Default)]
struct Table {
    unique_indexes: Vec<UniqueIndex>,
    foreign_keys: Vec<ForeignKey>,
    rows: Vec<Map<String, Value>>,
}

/// A tiny database speaking one dialect's error messages.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    dialect: Dialect,
    tables: HashMap<String, Table>,
    writes: usize,
}

impl MemoryDatabase {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: HashMap::new(),
            writes: 0,
        }
    }

    pub fn create_table(&mut self, name: &str) -> &mut Self {
        self.tables.entry(name.to_string()).or_default();
        self
    }

    pub fn add_unique_index(&mut self, table: &str, name: &str, columns: &[&str]) -> &mut Self {
        self.tables
            .entry(table.to_string())
            .or_default()
            .unique_indexes
            .push(UniqueIndex {
                name: name.to_string(),
                columns: columns.iter().map(|column| column.to_string()).collect(),
            });
        self
    }

    pub fn add_foreign_key(&mut self, table: &str, name: &str, column: &str, references: &str) -> &mut Self {
        self.tables
            .entry(table.to_string())
            .or_default()
            .foreign_keys
            .push(ForeignKey {
                name: name.to_string(),
                column: column.to_string(),
                references: references.to_string(),
            });
        self
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |table| table.rows.len())
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Inserts `row`, assigning an `id`. Fails like the real driver would.
    pub fn insert(&mut self, table_name: &str, row: &Map<String, Value>) -> Result<i64, DatabaseError> {
        self.writes += 1;
        let table = self
            .tables
            .get(table_name)
            .ok_or_else(|| DatabaseError::other(format!("no such table: {table_name}")))?;

        for index in &table.unique_indexes {
            let values: Vec<&Value> = index
                .columns
                .iter()
                .map(|column| row.get(column).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|value| value.is_null()) {
                continue;
            }
            let collides = table.rows.iter().any(|existing| {
                index
                    .columns
                    .iter()
                    .zip(&values)
                    .all(|(column, value)| existing.get(column) == Some(*value))
            });
            if collides {
                return Err(self.unique_violation(table_name, index, &values));
            }
        }

        for foreign_key in &table.foreign_keys {
            let Some(value) = row.get(&foreign_key.column).filter(|value| !value.is_null()) else {
                continue;
            };
            let present = self
                .tables
                .get(&foreign_key.references)
                .is_some_and(|referenced| referenced.rows.iter().any(|existing| existing.get("id") == Some(value)));
            if !present {
                return Err(self.foreign_key_violation(table_name, foreign_key, value));
            }
        }

        let table = self
            .tables
            .get_mut(table_name)
            .ok_or_else(|| DatabaseError::other(format!("no such table: {table_name}")))?;
        let id = table.rows.len() as i64 + 1;
        let mut stored = row.clone();
        stored.insert("id".to_string(), Value::from(id));
        table.rows.push(stored);
        Ok(id)
    }

    fn unique_violation(&self, table: &str, index: &UniqueIndex, values: &[&Value]) -> DatabaseError {
        let rendered: Vec<String> = values.iter().map(|value| render(value)).collect();
        let message = match self.dialect {
            Dialect::Postgresql => format!(
                "PG::UniqueViolation: ERROR:  duplicate key value violates unique constraint \"{}\"\n\
                 DETAIL:  Key ({})=({}) already exists.\n",
                index.name,
                index.columns.join(", "),
                rendered.join(", ")
            ),
            Dialect::Mysql => format!(
                "Mysql2::Error: Duplicate entry '{}' for key '{table}.{}'",
                rendered.join("-"),
                index.name
            ),
            Dialect::Sqlite => format!(
                "SQLite3::ConstraintException: UNIQUE constraint failed: {}",
                index
                    .columns
                    .iter()
                    .map(|column| format!("{table}.{column}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        DatabaseError::record_not_unique(message)
    }

    fn foreign_key_violation(&self, table: &str, foreign_key: &ForeignKey, value: &Value) -> DatabaseError {
        let message = match self.dialect {
            Dialect::Postgresql => format!(
                "PG::ForeignKeyViolation: ERROR:  insert or update on table \"{table}\" violates foreign key \
                 constraint \"{}\"\nDETAIL:  Key ({})=({}) is not present in table \"{}\".\n",
                foreign_key.name,
                foreign_key.column,
                render(value),
                foreign_key.references
            ),
            Dialect::Mysql => format!(
                "Mysql2::Error: Cannot add or update a child row: a foreign key constraint fails \
                 (`dbguard_test`.`{table}`, CONSTRAINT `{}` FOREIGN KEY (`{}`) REFERENCES `{}` (`id`))",
                foreign_key.name, foreign_key.column, foreign_key.references
            ),
            Dialect::Sqlite => "SQLite3::ConstraintException: FOREIGN KEY constraint failed".to_string(),
        };
        DatabaseError::invalid_foreign_key(message)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Persistence layer storing `DynamicRecord`s into their class's table.
pub struct MemoryStore<'r> {
    pub db: MemoryDatabase,
    registry: &'r Registry,
    required: HashMap<String, Vec<String>>,
}

impl<'r> MemoryStore<'r> {
    pub fn new(registry: &'r Registry, db: MemoryDatabase) -> Self {
        Self {
            db,
            registry,
            required: HashMap::new(),
        }
    }

    /// Application-level presence validation for `attribute` on `class`.
    pub fn require(mut self, class: &str, attribute: &str) -> Self {
        self.required
            .entry(class.to_string())
            .or_default()
            .push(attribute.to_string());
        self
    }
}

impl Persistence for MemoryStore<'_> {
    type Record = DynamicRecord;

    fn is_valid(&mut self, record: &mut DynamicRecord) -> bool {
        let missing: Vec<String> = self
            .registry
            .ancestors(record.class_name())
            .iter()
            .filter_map(|class| self.required.get(class))
            .flatten()
            .filter(|attribute| record.read_attribute(attribute).is_none_or(|value| value.is_null()))
            .cloned()
            .collect();
        for attribute in &missing {
            record.errors_mut().add(attribute, "blank", "can't be blank");
        }
        missing.is_empty()
    }

    fn persist(&mut self, record: &mut DynamicRecord) -> Result<(), DatabaseError> {
        let table = self
            .registry
            .table_for(record.class_name())
            .ok_or_else(|| DatabaseError::other(format!("{} has no table", record.class_name())))?;
        let id = self.db.insert(&table, record.attributes())?;
        record.set("id", id);
        Ok(())
    }
}

/// Registry with an `Entity` root class backed by `entities`.
pub fn entity_registry(options: RegistryOptions) -> Registry {
    let registry = Registry::new(options);
    registry
        .define(ClassDefinition::new("Entity").table("entities"))
        .expect("define Entity");
    registry
}

/// Database with `entities` (unique on `field`, `[a, b]`, FK `company_id`) and `companies`.
pub fn entity_database(dialect: Dialect) -> MemoryDatabase {
    let mut db = MemoryDatabase::new(dialect);
    db.create_table("companies")
        .create_table("entities")
        .add_unique_index("entities", "index_entities_on_field", &["field"])
        .add_unique_index("entities", "index_entities_on_a_and_b", &["a", "b"])
        .add_foreign_key("entities", "fk_rails_entities_company", "company_id", "companies");
    db
}
