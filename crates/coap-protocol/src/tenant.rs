//! Tenant model and the scoped per-thread tenant context.
//!
//! Tenants share one resource server and one worker pool. The tenant a work
//! item belongs to travels with the item itself; a worker only makes it
//! visible to the listener for the duration of the callback through a
//! [`TenantFlow`] guard.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// A logical tenant namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i32,
    pub domain: String,
}

impl Tenant {
    pub const SUPER_TENANT_ID: i32 = -1234;
    pub const SUPER_TENANT_DOMAIN: &'static str = "carbon.super";

    pub fn new(id: i32, domain: impl Into<String>) -> Self {
        Self {
            id,
            domain: domain.into(),
        }
    }

    /// The default (super) tenant. Its endpoints carry no tenant segments.
    pub fn super_tenant() -> Self {
        Self::new(Self::SUPER_TENANT_ID, Self::SUPER_TENANT_DOMAIN)
    }

    pub fn is_default(&self) -> bool {
        self.domain == Self::SUPER_TENANT_DOMAIN
    }
}

impl Default for Tenant {
    fn default() -> Self {
        Self::super_tenant()
    }
}

thread_local! {
    static CURRENT_TENANT: Cell<Option<i32>> = const { Cell::new(None) };
}

/// RAII guard that makes a tenant id current on this thread.
///
/// Dropping the guard restores whatever was current before, so flows nest
/// and are always closed, including while unwinding from a panic.
#[must_use = "the tenant flow ends as soon as the guard is dropped"]
pub struct TenantFlow {
    previous: Option<i32>,
}

impl TenantFlow {
    pub fn start(tenant_id: i32) -> Self {
        let previous = CURRENT_TENANT.with(|current| current.replace(Some(tenant_id)));
        Self { previous }
    }

    /// Tenant id of the innermost open flow on this thread.
    pub fn current() -> Option<i32> {
        CURRENT_TENANT.with(Cell::get)
    }
}

impl Drop for TenantFlow {
    fn drop(&mut self) {
        CURRENT_TENANT.with(|current| current.set(self.previous));
    }
}
