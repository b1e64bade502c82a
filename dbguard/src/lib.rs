//! dbguard: database-backed uniqueness and `belongs_to` validations.
//!
//! Instead of querying for duplicates before every write, the write is
//! attempted and a rejected unique index or foreign key is mapped back to
//! the declaration that covers it. The record then fails validation with an
//! ordinary attribute error.

pub mod adapters;
pub mod config;
pub mod errors;
pub mod interception;
pub mod keys;
pub mod record;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod validators;

pub use adapters::{Dialect, Extraction, MessageParser};
pub use config::DbGuardConfig;
pub use errors::*;
pub use interception::{Persistence, SaveGuard, WithDatabaseValidations};
pub use keys::{ConstraintKey, KeyKind};
pub use record::{DynamicRecord, Record};
pub use registration::DeclarationRegistration;
pub use registry::{
    ClassDefinition, DeclarationStorage, IndexCatalog, Registry, RegistryOptions, StaticIndexCatalog,
};
pub use resolver::{Evidence, Resolution, Resolver, handle_error};
pub use types::{BelongsToOptions, Conditions, UniquenessOptions, ValidatorSummary};
pub use validators::{BelongsToPresenceValidator, UniquenessValidator};

// Re-export inventory so declarations can be submitted without a direct dependency.
pub use inventory;
