//! The record abstraction shared by every synchronized entity.

use crate::entity::EntityKind;
use crate::timestamp::Timestamp;

/// A persisted entity subject to synchronization.
///
/// # Invariants
///
/// - `id` is unique within the entity kind
/// - `updated_at`, when present, is the instant of the last local change
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    /// The entity kind of this record type.
    const KIND: EntityKind;

    /// Returns the record id.
    fn id(&self) -> &str;

    /// Returns the creation instant.
    fn created_at(&self) -> Timestamp;

    /// Returns the instant of the last update, if the kind tracks one.
    fn updated_at(&self) -> Option<Timestamp>;

    /// Stamps the record as updated at `at`.
    ///
    /// Kinds without an update timestamp ignore this.
    fn touch(&mut self, _at: Timestamp) {}
}
