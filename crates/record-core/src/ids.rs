//! The four correlation identifiers (spec.md §3): `RequestContext`,
//! `ExecutionContext`, `CauseContext`, `DependencyContext`. All are opaque,
//! 128-bit-ish, text-encoded IDs, so we represent them uniformly as
//! [`Id`] — an `arcstr::ArcStr`, which makes clones (every record carries
//! four of them) a refcount bump instead of an allocation.

/// An opaque correlation identifier. Empty (`Id::new()`) is the sentinel for
/// "not applicable" — e.g. `DependencyContext` on a record that isn't about
/// an outbound call.
pub type Id = arcstr::ArcStr;

/// Mint a fresh identifier. The original prototype uses
/// `github.com/google/uuid`; we do the same rather than invent a new scheme.
pub fn new_id() -> Id {
    Id::from(uuid::Uuid::new_v4().to_string())
}

/// The empty identifier, used as the "no value" sentinel for optional ID
/// fields on the wire (`DependencyContext` when a record isn't about an
/// outbound call).
pub fn empty_id() -> Id {
    Id::new()
}
