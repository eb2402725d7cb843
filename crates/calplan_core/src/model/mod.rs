//! Calendar domain model.
//!
//! # Responsibility
//! - Define the canonical event and recurrence records owned by the store.
//! - Define the derived occurrence shape produced by timeline expansion.
//!
//! # Invariants
//! - Every event is identified by a store-assigned `EventId` that is never
//!   reused within one store instance.
//! - An event has at most one recurrence rule, joined by `event_id`.
//! - Occurrences are derived on demand and never persisted.

pub mod event;
pub mod occurrence;
pub mod recurrence;
