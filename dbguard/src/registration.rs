//! Link-time declaration discovery via the inventory crate.
//!
//! Model code can submit a `DeclarationRegistration` next to its type
//! definition; `Registry::global()` applies every submitted registration the
//! first time it is accessed.
//!
//! ```text
//! fn declare_entity(registry: &Registry) -> Result<(), DeclarationError> {
//!     registry.define_class("Entity", None)?;
//!     registry.validates_db_uniqueness_of("Entity", UniquenessOptions::new("field"))?;
//!     Ok(())
//! }
//!
//! dbguard::inventory::submit! {
//!     DeclarationRegistration::new("Entity", declare_entity)
//! }
//! ```

use crate::{errors::DeclarationError, registry::Registry};

/// Declarations for one model, applied to the global registry.
pub struct DeclarationRegistration {
    /// Name used in logs when the registration fails.
    pub name: &'static str,
    pub register: fn(&Registry) -> Result<(), DeclarationError>,
}

impl DeclarationRegistration {
    pub const fn new(name: &'static str, register: fn(&Registry) -> Result<(), DeclarationError>) -> Self {
        Self { name, register }
    }
}

inventory::collect!(DeclarationRegistration);

/// All registrations linked into the binary.
pub fn registered_declarations() -> impl Iterator<Item = &'static DeclarationRegistration> {
    inventory::iter::<DeclarationRegistration>()
}

/// Applies `registrations` to `registry`.
///
/// Link order is unspecified, so a child class may be registered before its
/// parent. Registrations failing with `UnknownClass` are retried for as long
/// as each round makes progress. Returns the registrations that still failed.
///
/// A failing registration is rolled back before it is retried or reported, so
/// whatever it declared before the error is not declared twice. Run this
/// before `registry` is shared with other threads.
pub fn apply<'a, I>(registry: &Registry, registrations: I) -> Vec<(&'static str, DeclarationError)>
where
    I: IntoIterator<Item = &'a DeclarationRegistration>,
{
    let mut pending: Vec<&DeclarationRegistration> = registrations.into_iter().collect();
    let mut failures = Vec::new();

    loop {
        let before = pending.len();
        let mut retry = Vec::new();
        for registration in pending {
            let snapshot = registry.snapshot();
            let Err(err) = (registration.register)(registry) else {
                continue;
            };
            registry.restore(snapshot);
            match err {
                DeclarationError::UnknownClass { .. } => retry.push((registration, err)),
                err => failures.push((registration.name, err)),
            }
        }
        if retry.is_empty() || retry.len() == before {
            failures.extend(retry.into_iter().map(|(registration, err)| (registration.name, err)));
            return failures;
        }
        pending = retry.into_iter().map(|(registration, _)| registration).collect();
    }
}

pub(crate) fn apply_registrations(registry: &Registry) -> Vec<(&'static str, DeclarationError)> {
    apply(registry, registered_declarations())
}
