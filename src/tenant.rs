use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::engine::{Engine, EngineError, StatsPolicy};
use crate::limits::*;
use crate::reloader;

/// Manages per-tenant engines. Each tenant reads its own dataset directory.
/// Tenant = database name from the pgwire connection.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    policy: StatsPolicy,
    reload_interval: Option<Duration>,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, policy: StatsPolicy, reload_interval: Option<Duration>) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            policy,
            reload_interval,
        }
    }

    /// Get or lazily load the engine for the given tenant.
    pub fn get_or_create(&self, tenant: &str) -> Result<Arc<Engine>, EngineError> {
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(EngineError::InvalidTenant("tenant name too long"));
        }

        // Sanitize tenant name to prevent path traversal
        let safe_name: String = tenant
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(EngineError::InvalidTenant("empty tenant name"));
        }

        // Keyed by directory so aliases of one tenant share an engine.
        if let Some(engine) = self.engines.get(&safe_name) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(EngineError::LimitExceeded("too many tenants"));
        }

        let engine = match self.engines.entry(safe_name.clone()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let engine = Arc::new(Engine::open(self.data_dir.join(&safe_name), self.policy)?);
                slot.insert(engine.clone());
                engine
            }
        };
        info!(
            "tenant {safe_name}: loaded {} bookings",
            engine.snapshot().bookings.len()
        );

        if let Some(every) = self.reload_interval {
            let reloader_engine = engine.clone();
            tokio::spawn(async move {
                reloader::run_reloader(reloader_engine, every).await;
            });
        }

        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    pub fn tenant_count(&self) -> usize {
        self.engines.len()
    }
}
