//! # AI Client Library
//!
//! This crate makes a remote generative-text backend behave like a dependable
//! subsystem. It covers three concerns:
//!
//! - [`catalog`]: discovering which backend model variants are usable and
//!   ranking them by a fixed preference order, with a configured fallback
//!   list when discovery fails.
//! - [`client`]: issuing a single generation request with a hard per-candidate
//!   deadline, walking the ranked model list on failure, and salvaging usable
//!   output from token-limited responses.
//! - [`extract`]: recovering a single JSON value from arbitrary free text
//!   (fenced blocks, brace-balanced scanning, control-character repair).
//!
//! Expected failure modes are tagged results ([`CompletionResult`],
//! [`extract::ExtractionFailure`]); nothing in this crate panics on backend
//! misbehavior.

pub mod catalog;
pub mod client;
pub mod error;
pub mod extract;
pub mod wire;

pub use catalog::{CapabilityClass, ModelCandidate, ModelCatalog, ModelDiscovery};
pub use client::{
    CompletionProvider, CompletionRequest, CompletionResult, PartialReason,
    ResilientCompletionClient,
};
pub use error::{AiError, ErrorKind};
