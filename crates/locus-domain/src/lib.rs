//! Locus Domain Layer
//!
//! Core domain model for extracting geographic locations from scientific
//! papers. It has ZERO external dependencies and defines the value objects and
//! trait interfaces that the other layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Document**: extracted paper text, optional abstract and bibliographic metadata
//! - **Chunk**: a bounded slice of document text sized for one LLM call
//! - **RawLocationMention**: one location reported by the model for one chunk
//! - **AggregatedLocation**: the per-document merge of all mentions of a location
//!
//! ## Architecture
//!
//! - No external crate dependencies
//! - Pure data and invariants only
//! - Trait definitions for the LLM boundary live in [`traits`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod document;
pub mod location;
pub mod traits;

// Re-exports for convenience
pub use chunk::Chunk;
pub use document::{Document, PaperMetadata};
pub use location::{AggregatedLocation, RawLocationMention};
