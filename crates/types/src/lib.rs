//! Core types and data models for streamstats
//!
//! This crate provides the data structures shared by every component of the
//! aggregation engine: the event envelope, field paths, and the identifiers
//! used to correlate events, groups and shards.

pub mod errors;
pub mod events;
pub mod fields;
pub mod ids;

pub use errors::FieldPathError;
pub use events::Event;
pub use fields::{FieldPath, Segment};
pub use ids::{EventId, GroupFingerprint, ShardId};
