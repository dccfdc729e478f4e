//! Domain event mechanics: envelopes, buses, sagas.
//!
//! No business rules live here — this crate only defines how events are
//! described, wrapped, distributed, and reacted to.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod saga;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::InMemoryEventBus;
pub use saga::{Saga, SagaAction};
