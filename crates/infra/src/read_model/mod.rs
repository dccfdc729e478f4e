//! Disposable, tenant-isolated read-model storage.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, TenantStore};
