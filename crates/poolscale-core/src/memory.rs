//! In-memory `PoolApi`: a pool that exists only in this process.
//!
//! Used by tests across the workspace and by `poolscaled plan` dry runs.
//! Supports injected latency (to widen race windows) and injected
//! failures for the status and resize calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::{PoolApi, PoolMember, PoolRef, PoolStatus};

#[derive(Debug, Default)]
struct Inner {
    size: u32,
    /// Explicit member list; when `None` members are derived from `size`.
    members: Option<Vec<PoolMember>>,
    fail_status: bool,
    fail_resize: bool,
    resize_calls: Vec<u32>,
}

/// A cloneable in-memory pool. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    inner: Arc<Mutex<Inner>>,
    latency: Duration,
}

impl MemoryPool {
    /// Create a pool with `size` generated members (`inst-N` / `host-N`).
    pub fn new(size: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                size,
                ..Inner::default()
            })),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency` before touching state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Current size as the provider sees it.
    pub fn size(&self) -> u32 {
        self.lock().size
    }

    /// Change the size behind the controller's back.
    pub fn set_size(&self, size: u32) {
        self.lock().size = size;
    }

    /// Pin the member list, independent of `size`.
    pub fn set_members(&self, members: Vec<PoolMember>) {
        self.lock().members = Some(members);
    }

    pub fn fail_status(&self, fail: bool) {
        self.lock().fail_status = fail;
    }

    pub fn fail_resizes(&self, fail: bool) {
        self.lock().fail_resize = fail;
    }

    /// Target sizes of every accepted resize call, oldest first.
    pub fn resize_calls(&self) -> Vec<u32> {
        self.lock().resize_calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Members generated for a pool of `size` instances.
pub fn generated_members(size: u32) -> Vec<PoolMember> {
    (0..size)
        .map(|i| PoolMember {
            id: format!("inst-{i}"),
            display_name: format!("host-{i}"),
        })
        .collect()
}

#[async_trait]
impl PoolApi for MemoryPool {
    async fn pool_status(&self, pool: &PoolRef) -> anyhow::Result<PoolStatus> {
        self.delay().await;
        let inner = self.lock();
        if inner.fail_status {
            anyhow::bail!("status query failed for pool {pool}");
        }
        let members = inner
            .members
            .clone()
            .unwrap_or_else(|| generated_members(inner.size));
        Ok(PoolStatus {
            size: inner.size,
            members,
        })
    }

    async fn resize(&self, pool: &PoolRef, size: u32) -> anyhow::Result<()> {
        self.delay().await;
        let mut inner = self.lock();
        if inner.fail_resize {
            anyhow::bail!("resize of pool {pool} to {size} rejected by provider");
        }
        debug!(%pool, from = inner.size, to = size, "in-memory pool resized");
        inner.size = size;
        inner.resize_calls.push(size);
        Ok(())
    }
}
