//! Infrastructure layer: event store, command dispatch, read models.
//!
//! This crate is the application-side caller of the pure domain crates: it
//! loads document streams, rehydrates aggregates, runs their command
//! handlers, persists the resulting events, and maintains queryable read
//! models from the published stream.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod saga;
pub mod sequence;
