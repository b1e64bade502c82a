//! TOML description of classes and their database-backed declarations.
//!
//! ```toml
//! dialect = "postgresql"
//!
//! [[classes]]
//! name = "Entity"
//! table = "entities"
//!
//! [[classes.uniqueness]]
//! attribute = "field"
//!
//! [[classes]]
//! name = "Post"
//! parent = "Entity"
//!
//! [[classes.belongs_to]]
//! association = "author"
//! foreign_key = "user_id"
//!
//! [[indexes]]
//! table = "entities"
//! name = "index_entities_on_field"
//! columns = ["field"]
//! ```
//!
//! `if`/`unless` guards are closures and can only be attached through the
//! Rust API.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    adapters::Dialect,
    errors::{ConfigError, DeclarationError},
    registry::{ClassDefinition, Registry, RegistryOptions, StaticIndexCatalog},
    types::{BelongsToOptions, UniquenessOptions},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbGuardConfig {
    /// Default dialect for every class.
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
    /// Index catalog used when messages only name the index.
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uniqueness: Vec<UniquenessConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub belongs_to: Vec<BelongsToConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniquenessConfig {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BelongsToConfig {
    pub association: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
}

impl UniquenessConfig {
    pub fn to_options(&self) -> UniquenessOptions {
        let mut options = UniquenessOptions::new(&self.attribute)
            .scope(self.scope.iter().cloned())
            .case_sensitive(self.case_sensitive);
        if let Some(index_name) = &self.index_name {
            options = options.index_name(index_name);
        }
        if let Some(message) = &self.message {
            options = options.message(message);
        }
        options
    }
}

impl BelongsToConfig {
    pub fn to_options(&self) -> BelongsToOptions {
        let mut options = BelongsToOptions::new(&self.association);
        if let Some(foreign_key) = &self.foreign_key {
            options = options.foreign_key(foreign_key);
        }
        if let Some(message) = &self.message {
            options = options.message(message);
        }
        options
    }
}

impl ClassConfig {
    fn definition(&self) -> ClassDefinition {
        ClassDefinition {
            name: self.name.clone(),
            parent: self.parent.clone(),
            table: self.table.clone(),
            dialect: self.dialect,
        }
    }
}

impl DbGuardConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        let options = RegistryOptions::new(self.dialect);
        if self.indexes.is_empty() {
            return options;
        }
        let catalog = self
            .indexes
            .iter()
            .fold(StaticIndexCatalog::new(), |catalog, index| {
                catalog.with(&index.table, &index.name, index.columns.iter().cloned())
            });
        options.with_index_catalog(catalog)
    }

    /// Builds a fresh registry holding every class and declaration.
    pub fn build_registry(&self) -> Result<Registry, ConfigError> {
        let registry = Registry::new(self.registry_options());
        self.apply(&registry)?;
        Ok(registry)
    }

    /// Registers classes (parents before children, whatever the file order)
    /// and then their declarations.
    pub fn apply(&self, registry: &Registry) -> Result<(), ConfigError> {
        let mut pending: Vec<&ClassConfig> = self.classes.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for class in pending {
                let parent_missing = class
                    .parent
                    .as_deref()
                    .is_some_and(|parent| !registry.is_defined(parent));
                if parent_missing {
                    deferred.push(class);
                } else {
                    registry.define(class.definition())?;
                }
            }
            if deferred.len() == before {
                return Err(self.stuck(&deferred).into());
            }
            pending = deferred;
        }

        for class in &self.classes {
            for uniqueness in &class.uniqueness {
                registry.validates_db_uniqueness_of(&class.name, uniqueness.to_options())?;
            }
            for belongs_to in &class.belongs_to {
                registry.db_belongs_to(&class.name, belongs_to.to_options())?;
            }
        }
        Ok(())
    }

    // Every stuck class waits on a parent declared in this file: they form a cycle.
    fn stuck(&self, deferred: &[&ClassConfig]) -> DeclarationError {
        let declared_here = |parent: &str| self.classes.iter().any(|class| class.name == parent);
        let cyclic = deferred
            .iter()
            .all(|class| class.parent.as_deref().is_some_and(declared_here));
        if cyclic {
            return DeclarationError::InheritanceCycle {
                class: deferred[0].name.clone(),
            };
        }
        let class = deferred
            .iter()
            .filter_map(|class| class.parent.as_deref())
            .find(|parent| !declared_here(*parent))
            .or_else(|| deferred[0].parent.as_deref())
            .unwrap_or_default()
            .to_string();
        DeclarationError::UnknownClass { class }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
dialect = "mysql"

[[classes]]
name = "Child"
parent = "Entity"

[[classes.belongs_to]]
association = "company"

[[classes]]
name = "Entity"
table = "entities"

[[classes.uniqueness]]
attribute = "field"
scope = ["tenant_id"]
message = "is already used"
case_sensitive = false

[[indexes]]
table = "entities"
name = "index_entities_on_field"
columns = ["field", "tenant_id"]
"#;

    #[test]
    fn parses_and_applies_out_of_order_classes() {
        let config = DbGuardConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.dialect, Dialect::Mysql);
        let registry = config.build_registry().unwrap();

        assert_eq!(registry.ancestors("Child"), vec!["Child", "Entity"]);
        assert_eq!(registry.table_for("Child").as_deref(), Some("entities"));
        let uniqueness = registry.uniqueness_validators("Child");
        assert_eq!(uniqueness.len(), 1);
        assert!(!uniqueness[0].case_sensitive());
        assert_eq!(uniqueness[0].key().as_str(), "uniqueness__field__tenant_id");
        assert_eq!(registry.belongs_to_presence_validators("Child")[0].foreign_key(), "company_id");
        assert!(registry.index_catalog().is_some());
    }

    #[test]
    fn missing_parent_is_reported() {
        let config = DbGuardConfig::from_toml_str(
            r#"
[[classes]]
name = "Child"
parent = "Ghost"
"#,
        )
        .unwrap();
        match config.build_registry() {
            Err(ConfigError::Declaration(DeclarationError::UnknownClass { class })) => assert_eq!(class, "Ghost"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parent_cycle_is_reported_as_a_cycle() {
        let config = DbGuardConfig::from_toml_str(
            r#"
[[classes]]
name = "A"
parent = "B"

[[classes]]
name = "B"
parent = "A"
"#,
        )
        .unwrap();
        match config.build_registry() {
            Err(ConfigError::Declaration(DeclarationError::InheritanceCycle { class })) => assert_eq!(class, "A"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_parent_wins_over_waiting_children() {
        let config = DbGuardConfig::from_toml_str(
            r#"
[[classes]]
name = "Grandchild"
parent = "Child"

[[classes]]
name = "Child"
parent = "Ghost"
"#,
        )
        .unwrap();
        match config.build_registry() {
            Err(ConfigError::Declaration(DeclarationError::UnknownClass { class })) => assert_eq!(class, "Ghost"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = DbGuardConfig::load(file.path()).unwrap();
        assert_eq!(config.classes.len(), 2);
    }

    #[test]
    fn demo_config_builds() {
        let config = DbGuardConfig::from_toml_str(include_str!("../demos/dbguard.toml")).unwrap();
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.dialect_for("Account"), Dialect::Mysql);
        assert_eq!(registry.dialect_for("Post"), Dialect::Postgresql);
        assert_eq!(registry.uniqueness_validators("Post").len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = DbGuardConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = DbGuardConfig::from_toml_str("classes = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
