use axum::{Router, routing::get};

pub mod common;
pub mod deliveries;
pub mod events;
pub mod inventory;
pub mod invoices;
pub mod orders;
pub mod picking;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/items", inventory::router())
        .nest("/orders", orders::router())
        .nest("/pick-lists", picking::router())
        .nest("/deliveries", deliveries::router())
        .nest("/invoices", invoices::router())
        .nest("/events", events::router())
}
