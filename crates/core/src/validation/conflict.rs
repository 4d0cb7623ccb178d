//! Conflict resolution between repeated declarations on the same field.
//!
//! Policy: a declaration whose rule kind already exists on the field
//! overwrites that entry in place (parameters and default), keeping its
//! position in the field's rule list. A new rule kind is appended.

use super::rules::{Expectation, Registry};

/// What happened when an expectation was registered.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictResolution {
    Appended,
    Overwritten { previous: Expectation },
}

/// Register `incoming` into a field's rule list under the overwrite policy.
pub fn merge_expectation(
    existing: &mut Vec<Expectation>,
    incoming: Expectation,
) -> ConflictResolution {
    match existing.iter_mut().find(|e| e.kind() == incoming.kind()) {
        Some(slot) => {
            let previous = std::mem::replace(slot, incoming);
            ConflictResolution::Overwritten { previous }
        }
        None => {
            existing.push(incoming);
            ConflictResolution::Appended
        }
    }
}

/// Layer `overlay` on top of `base`, resolving every overlay entry against
/// the base with [`merge_expectation`].
///
/// Fields keep the base's order; fields only present in the overlay follow
/// in overlay order.
pub fn layer_registries(base: &Registry, overlay: &Registry) -> Registry {
    let mut result = base.clone();

    for (field, expectations) in overlay {
        let slot = result.entry(field.clone()).or_default();
        for expectation in expectations {
            merge_expectation(slot, expectation.clone());
        }
    }

    result
}
