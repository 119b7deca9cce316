//! Entity capability: the minimal contract an item must satisfy to be stored.

use crate::id::Id;

/// A storable, immutable value object with an optional identifier.
///
/// Entities start life unsaved (no identifier); a repository assigns one on
/// first save. Mutation is always expressed as "save a replacement value",
/// so `with_id` must return a new value rather than mutating the receiver.
/// `PartialEq` is structural and drives no-op write detection.
pub trait Entity: Clone + PartialEq + Send + Sync + Sized + 'static {
    /// The entity's current identifier, or `None` if it has never been saved.
    fn id(&self) -> Option<&Id<Self>>;

    /// A copy of this entity carrying the given identifier.
    fn with_id(self, id: Id<Self>) -> Self;
}
