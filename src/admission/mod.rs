//! Admission control for training runs
//!
//! Every run must hold one global slot and one slot from its tenant's private
//! pool for the whole execution window. Tenant pools are created lazily on
//! first reference and live for the process lifetime. Acquisition blocks the
//! calling worker, never the submitter; release happens through the RAII
//! permit, exactly once per acquire on every exit path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Result, TrainrError};

/// Enforces the global and per-tenant concurrency caps.
#[derive(Debug)]
pub struct AdmissionController {
    global: Arc<Semaphore>,
    global_limit: usize,
    per_tenant_limit: usize,
    /// Lazily created tenant pools; an existing pool is never replaced
    tenant_pools: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// Both slots held by an admitted run.
///
/// Dropping the permit releases the tenant slot and the global slot. There is
/// no other release path, so double-release cannot be expressed.
#[derive(Debug)]
pub struct AdmissionPermit {
    tenant_id: String,
    _tenant: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        tracing::debug!(tenant_id = %self.tenant_id, "Admission slots released");
    }
}

impl AdmissionController {
    /// Create a controller with the given caps. Both limits must be >= 1.
    pub fn new(global_limit: usize, per_tenant_limit: usize) -> Result<Self> {
        if global_limit == 0 {
            return Err(TrainrError::InvalidLimit("global limit must be > 0".to_string()));
        }
        if per_tenant_limit == 0 {
            return Err(TrainrError::InvalidLimit("per-tenant limit must be > 0".to_string()));
        }
        Ok(Self {
            global: Arc::new(Semaphore::new(global_limit)),
            global_limit,
            per_tenant_limit,
            tenant_pools: Mutex::new(HashMap::new()),
        })
    }

    /// Block until a global slot and a slot in the tenant's pool are free,
    /// then hold both until the returned permit is dropped.
    ///
    /// Waiters are queued by the underlying semaphore; no fairness beyond
    /// that is promised.
    pub async fn acquire(&self, tenant_id: &str) -> Result<AdmissionPermit> {
        let tenant_pool = self.tenant_pool(tenant_id);

        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| TrainrError::Admission(e.to_string()))?;
        let tenant = tenant_pool
            .acquire_owned()
            .await
            .map_err(|e| TrainrError::Admission(e.to_string()))?;

        tracing::debug!(tenant_id = %tenant_id, "Admission slots acquired");
        Ok(AdmissionPermit {
            tenant_id: tenant_id.to_string(),
            _tenant: tenant,
            _global: global,
        })
    }

    /// Number of free global slots right now.
    pub fn available_global(&self) -> usize {
        self.global.available_permits()
    }

    /// Configured global cap.
    pub fn global_limit(&self) -> usize {
        self.global_limit
    }

    /// Configured per-tenant cap.
    pub fn per_tenant_limit(&self) -> usize {
        self.per_tenant_limit
    }

    /// Get the tenant's pool, creating it on first reference.
    fn tenant_pool(&self, tenant_id: &str) -> Arc<Semaphore> {
        let mut pools = self.tenant_pools.lock().expect("tenant pool registry poisoned");
        pools
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_tenant_limit)))
            .clone()
    }
}
