//! Shared application state handed to every handler (spec §6).

use std::sync::Arc;

use fieldline_core::prelude::FieldlineConfig;
use fieldline_scheduling::prelude::Scheduler;
use fieldline_session::prelude::Supervisor;
use fieldline_storage::prelude::{AuditLedger, Store};

pub struct AppState {
    pub store: Store,
    pub audit: AuditLedger,
    pub supervisor: Supervisor,
    pub scheduler: Scheduler,
    pub config: FieldlineConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Store, config: FieldlineConfig) -> Self {
        let audit = AuditLedger::new(store.pool().clone());
        let supervisor = Supervisor::new(config.session_limits);
        Self { store, audit, supervisor, scheduler: Scheduler::new(), config }
    }
}
