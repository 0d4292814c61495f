//! Domain models and the persistence seam.
//!
//! Records live in an external document store addressed by composite keys;
//! this crate defines the store contract ([`store::DocumentStore`]), an
//! in-memory implementation for services and tests, and the serializable
//! model types the rest of the workspace shares. The core never queries
//! across collections; everything is single-document reads, writes, and
//! merges.

pub mod models;
pub mod store;

pub use store::{DocumentStore, MemoryStore, StoreError, composite_key};
