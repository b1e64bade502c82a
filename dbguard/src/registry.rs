//! Per-class declaration storage and the explicit class hierarchy it hangs off.
//!
//! Every class owns its own `DeclarationStorage`, created lazily on the first
//! declaration. Lookups walk from the class being saved up through its
//! ancestors, so a parent that gains declarations after a child was defined
//! is still seen by the child.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use log::{debug, error};

use crate::{
    adapters::{self, Dialect, MessageParser},
    errors::DeclarationError,
    keys::ConstraintKey,
    registration,
    types::{BelongsToOptions, UniquenessOptions},
    validators::{BelongsToPresenceValidator, UniquenessValidator},
};

/// Schema lookup used when a dialect names an index but not its columns.
pub trait IndexCatalog: Send + Sync {
    fn index_columns(&self, table: &str, index_name: &str) -> Option<Vec<String>>;
}

/// In-memory `IndexCatalog`.
#[derive(Debug, Clone, Default)]
pub struct StaticIndexCatalog {
    indexes: HashMap<(String, String), Vec<String>>,
}

impl StaticIndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I, S>(&mut self, table: impl Into<String>, index_name: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.insert(
            (table.into(), index_name.into()),
            columns.into_iter().map(Into::into).collect(),
        );
    }

    pub fn with<I, S>(mut self, table: impl Into<String>, index_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add(table, index_name, columns);
        self
    }
}

impl IndexCatalog for StaticIndexCatalog {
    fn index_columns(&self, table: &str, index_name: &str) -> Option<Vec<String>> {
        self.indexes
            .get(&(table.to_string(), index_name.to_string()))
            .cloned()
    }
}

/// Validators declared on one class, keyed by canonical key.
#[derive(Debug, Clone, Default)]
pub struct DeclarationStorage {
    uniqueness: HashMap<ConstraintKey, Arc<UniquenessValidator>>,
    uniqueness_order: Vec<ConstraintKey>,
    belongs_to: HashMap<ConstraintKey, Arc<BelongsToPresenceValidator>>,
    belongs_to_order: Vec<ConstraintKey>,
}

impl DeclarationStorage {
    pub fn uniqueness(&self, key: &ConstraintKey) -> Option<&Arc<UniquenessValidator>> {
        self.uniqueness.get(key)
    }

    pub fn belongs_to(&self, key: &ConstraintKey) -> Option<&Arc<BelongsToPresenceValidator>> {
        self.belongs_to.get(key)
    }

    /// Uniqueness validators in declaration order.
    pub fn uniqueness_validators(&self) -> impl Iterator<Item = &Arc<UniquenessValidator>> {
        self.uniqueness_order
            .iter()
            .filter_map(|key| self.uniqueness.get(key))
    }

    /// Belongs-to validators in declaration order.
    pub fn belongs_to_presence_validators(&self) -> impl Iterator<Item = &Arc<BelongsToPresenceValidator>> {
        self.belongs_to_order
            .iter()
            .filter_map(|key| self.belongs_to.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.uniqueness.is_empty() && self.belongs_to.is_empty()
    }

    fn push_uniqueness(&mut self, validator: Arc<UniquenessValidator>) -> Result<(), DeclarationError> {
        let key = validator.key().clone();
        if self.uniqueness.contains_key(&key) {
            return Err(DeclarationError::DuplicateKey {
                class: validator.class().to_string(),
                key: key.to_string(),
            });
        }
        self.uniqueness_order.push(key.clone());
        self.uniqueness.insert(key, validator);
        Ok(())
    }

    fn push_belongs_to(&mut self, validator: Arc<BelongsToPresenceValidator>) -> Result<(), DeclarationError> {
        let key = validator.key().clone();
        if self.belongs_to.contains_key(&key) {
            return Err(DeclarationError::DuplicateKey {
                class: validator.class().to_string(),
                key: key.to_string(),
            });
        }
        self.belongs_to_order.push(key.clone());
        self.belongs_to.insert(key, validator);
        Ok(())
    }
}

/// Description of a class known to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDefinition {
    pub name: String,
    pub parent: Option<String>,
    /// Table backing the class; inherited from the parent when absent.
    pub table: Option<String>,
    /// Dialect override; inherited from the parent, then the registry default.
    pub dialect: Option<Dialect>,
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ClassEntry {
    definition: ClassDefinition,
    storage: Option<Arc<DeclarationStorage>>,
}

/// Settings shared by every class in a registry.
#[derive(Clone, Default)]
pub struct RegistryOptions {
    /// Dialect for classes that do not override it.
    pub dialect: Dialect,
    pub index_catalog: Option<Arc<dyn IndexCatalog>>,
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("dialect", &self.dialect)
            .field("index_catalog", &self.index_catalog.is_some())
            .finish()
    }
}

impl RegistryOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            index_catalog: None,
        }
    }

    pub fn with_index_catalog(mut self, catalog: impl IndexCatalog + 'static) -> Self {
        self.index_catalog = Some(Arc::new(catalog));
        self
    }
}

/// Process-wide map from class name to its definition and declarations.
///
/// Declarations are written copy-on-write: readers work on `Arc` snapshots of
/// a storage, so a save running on another thread never observes a half
/// applied declaration.
#[derive(Debug, Default)]
pub struct Registry {
    options: RegistryOptions,
    classes: RwLock<HashMap<String, ClassEntry>>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    pub fn new(options: RegistryOptions) -> Self {
        Self {
            options,
            classes: RwLock::new(HashMap::new()),
        }
    }

    /// Shared registry populated from link-time `DeclarationRegistration`s.
    ///
    /// Uses default options unless `init_global` ran first.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(|| Registry::populated(RegistryOptions::default()))
    }

    /// Builds the global registry with `options`.
    ///
    /// Returns `false` when the global registry already exists, in which case
    /// `options` are dropped.
    pub fn init_global(options: RegistryOptions) -> bool {
        let mut installed = false;
        GLOBAL.get_or_init(|| {
            installed = true;
            Registry::populated(options)
        });
        installed
    }

    fn populated(options: RegistryOptions) -> Registry {
        let registry = Registry::new(options);
        for (name, err) in registration::apply_registrations(&registry) {
            error!("declaration registration '{name}' failed: {err}");
        }
        registry
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Defines a class, optionally inheriting from an already defined parent.
    ///
    /// Redefining a class with the same parent is a no-op.
    pub fn define_class(&self, name: &str, parent: Option<&str>) -> Result<(), DeclarationError> {
        let mut definition = ClassDefinition::new(name);
        definition.parent = parent.map(str::to_string);
        self.define(definition)
    }

    pub fn define(&self, definition: ClassDefinition) -> Result<(), DeclarationError> {
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = classes.get(&definition.name) {
            if existing.definition.parent != definition.parent {
                return Err(DeclarationError::ParentMismatch {
                    class: definition.name,
                    existing: existing.definition.parent.clone(),
                    requested: definition.parent,
                });
            }
            return Ok(());
        }

        if let Some(parent) = &definition.parent {
            if parent == &definition.name {
                return Err(DeclarationError::InheritanceCycle { class: definition.name });
            }
            if !classes.contains_key(parent) {
                return Err(DeclarationError::UnknownClass { class: parent.clone() });
            }
        }

        debug!("defined class {} (parent {:?})", definition.name, definition.parent);
        classes.insert(
            definition.name.clone(),
            ClassEntry {
                definition,
                storage: None,
            },
        );
        Ok(())
    }

    pub fn is_defined(&self, class: &str) -> bool {
        self.read().contains_key(class)
    }

    pub fn parent_of(&self, class: &str) -> Option<String> {
        self.read()
            .get(class)
            .and_then(|entry| entry.definition.parent.clone())
    }

    /// The class followed by its ancestors, nearest first. Unknown classes
    /// yield an empty chain.
    pub fn ancestors(&self, class: &str) -> Vec<String> {
        let classes = self.read();
        let mut chain = Vec::new();
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            let Some(entry) = classes.get(&name) else {
                break;
            };
            current = entry.definition.parent.clone();
            chain.push(name);
        }
        chain
    }

    /// Dialect of the nearest class in the chain that sets one, else the default.
    pub fn dialect_for(&self, class: &str) -> Dialect {
        self.nearest(class, |definition| definition.dialect)
            .unwrap_or(self.options.dialect)
    }

    /// Table of the nearest class in the chain that sets one.
    pub fn table_for(&self, class: &str) -> Option<String> {
        self.nearest(class, |definition| definition.table.clone())
    }

    pub fn parser_for(&self, class: &str) -> &'static dyn MessageParser {
        adapters::factory(self.dialect_for(class))
    }

    pub fn index_catalog(&self) -> Option<&dyn IndexCatalog> {
        self.options.index_catalog.as_deref()
    }

    /// Snapshot of the class's own storage, if it declared anything.
    pub fn storage(&self, class: &str) -> Option<Arc<DeclarationStorage>> {
        self.read().get(class).and_then(|entry| entry.storage.clone())
    }

    /// Snapshots of every storage along the ancestor chain, nearest first.
    pub fn storages(&self, class: &str) -> Vec<(String, Arc<DeclarationStorage>)> {
        let classes = self.read();
        let mut storages = Vec::new();
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            let Some(entry) = classes.get(&name) else {
                break;
            };
            current = entry.definition.parent.clone();
            if let Some(storage) = &entry.storage {
                storages.push((name, Arc::clone(storage)));
            }
        }
        storages
    }

    /// Declares a database-backed uniqueness constraint on `class`.
    pub fn validates_db_uniqueness_of(
        &self,
        class: &str,
        options: UniquenessOptions,
    ) -> Result<Arc<UniquenessValidator>, DeclarationError> {
        let validator = Arc::new(UniquenessValidator::new(class, options)?);
        self.with_storage(class, |storage| storage.push_uniqueness(Arc::clone(&validator)))?;
        debug!("{class} validates_db_uniqueness_of {}", validator.key());
        Ok(validator)
    }

    /// Declares a database-backed `belongs_to` presence constraint on `class`.
    pub fn db_belongs_to(
        &self,
        class: &str,
        options: BelongsToOptions,
    ) -> Result<Arc<BelongsToPresenceValidator>, DeclarationError> {
        let validator = Arc::new(BelongsToPresenceValidator::new(class, options)?);
        self.with_storage(class, |storage| storage.push_belongs_to(Arc::clone(&validator)))?;
        debug!("{class} db_belongs_to {}", validator.key());
        Ok(validator)
    }

    /// Uniqueness validators of `class` and its ancestors, own declarations first.
    pub fn uniqueness_validators(&self, class: &str) -> Vec<Arc<UniquenessValidator>> {
        self.storages(class)
            .iter()
            .flat_map(|(_, storage)| storage.uniqueness_validators().cloned())
            .collect()
    }

    /// Belongs-to validators of `class` and its ancestors, own declarations first.
    pub fn belongs_to_presence_validators(&self, class: &str) -> Vec<Arc<BelongsToPresenceValidator>> {
        self.storages(class)
            .iter()
            .flat_map(|(_, storage)| storage.belongs_to_presence_validators().cloned())
            .collect()
    }

    fn with_storage<F>(&self, class: &str, apply: F) -> Result<(), DeclarationError>
    where
        F: FnOnce(&mut DeclarationStorage) -> Result<(), DeclarationError>,
    {
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        let entry = classes
            .get_mut(class)
            .ok_or_else(|| DeclarationError::UnknownClass { class: class.to_string() })?;

        let mut storage = entry
            .storage
            .as_deref()
            .cloned()
            .unwrap_or_default();
        apply(&mut storage)?;
        entry.storage = Some(Arc::new(storage));
        Ok(())
    }

    fn nearest<T, F>(&self, class: &str, pick: F) -> Option<T>
    where
        F: Fn(&ClassDefinition) -> Option<T>,
    {
        let classes = self.read();
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            let entry = classes.get(&name)?;
            if let Some(value) = pick(&entry.definition) {
                return Some(value);
            }
            current = entry.definition.parent.clone();
        }
        None
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ClassEntry>> {
        self.classes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every class entry. Storages are shared, not cloned.
    pub(crate) fn snapshot(&self) -> HashMap<String, ClassEntry> {
        self.read().clone()
    }

    pub(crate) fn restore(&self, snapshot: HashMap<String, ClassEntry>) {
        *self.classes.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}
