//! Save wrapper that turns resolvable database violations into validation
//! failures.

use log::debug;

use crate::{
    errors::{DatabaseError, SaveError},
    record::Record,
    registry::Registry,
    resolver::Resolver,
};

/// Hooks the persistence layer exposes to the save wrapper.
pub trait Persistence {
    type Record: Record;

    /// Application-level validity check, run before the write.
    fn is_valid(&mut self, record: &mut Self::Record) -> bool;

    /// Writes the record. Rejections surface as the driver's raw error.
    fn persist(&mut self, record: &mut Self::Record) -> Result<(), DatabaseError>;
}

/// Wraps a `Persistence` so that declared unique and foreign key violations
/// come back as attribute errors instead of database errors.
///
/// `SaveGuard` does not implement `Persistence` itself, so a persistence
/// layer can only be wrapped once.
pub struct SaveGuard<'r, P> {
    resolver: Resolver<'r>,
    inner: P,
}

impl<'r, P> SaveGuard<'r, P>
where
    P: Persistence,
{
    pub fn new(registry: &'r Registry, inner: P) -> Self {
        Self {
            resolver: Resolver::new(registry),
            inner,
        }
    }

    /// The wrapped layer's own validity check, untouched by the guard.
    pub fn valid_without_database_validations(&mut self, record: &mut P::Record) -> bool {
        self.inner.is_valid(record)
    }

    /// Validates and persists `record`.
    ///
    /// Returns `Ok(true)` when the write went through and `Ok(false)` when the
    /// record is invalid, either before the write or because the database
    /// rejected it for a declared reason (the record's errors say which).
    /// Any other database error is returned unchanged.
    pub fn save(&mut self, record: &mut P::Record) -> Result<bool, DatabaseError> {
        record.errors_mut().clear();
        if !self.inner.is_valid(record) {
            debug!("{} failed application validation", record.class_name());
            return Ok(false);
        }

        match self.inner.persist(record) {
            Ok(()) => Ok(true),
            Err(error) if error.is_constraint_violation() => {
                if self.resolver.handle_error(record, &error).is_resolved() {
                    Ok(false)
                } else {
                    Err(error)
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Like `save`, but reports an invalid record as `SaveError::Invalid`.
    pub fn save_strict(&mut self, record: &mut P::Record) -> Result<(), SaveError> {
        if self.save(record)? {
            Ok(())
        } else {
            Err(SaveError::Invalid(record.errors().to_validation_error()))
        }
    }

    pub fn resolver(&self) -> Resolver<'r> {
        self.resolver
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

/// Extension for wrapping any `Persistence` in a `SaveGuard`.
pub trait WithDatabaseValidations: Persistence + Sized {
    fn with_database_validations(self, registry: &Registry) -> SaveGuard<'_, Self> {
        SaveGuard::new(registry, self)
    }
}

impl<P> WithDatabaseValidations for P where P: Persistence {}
