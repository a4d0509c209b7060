//! Tenant-scoped persistence: the consent/audit ledger and the CRUD storage adapter
//! (spec §4 components 1 and 2), backed by SQLite via `sqlx`.

pub mod audit;
pub mod error;
pub mod store;

pub mod prelude {
    pub use crate::audit::AuditLedger;
    pub use crate::error::{Result, StorageError};
    pub use crate::store::{JobFilter, Store};
}
