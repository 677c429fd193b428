//! Contract with the external compute-management service.
//!
//! The core never talks to the provider directly; hosts hand it a
//! `PoolApi` implementation backed by whatever SDK or HTTP client they use.

use std::fmt;

use async_trait::async_trait;

use crate::types::PoolId;

/// Identifies one managed pool and the scope it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolRef {
    pub pool_id: PoolId,
    pub compartment_id: String,
    pub region: String,
}

impl PoolRef {
    pub fn new(
        pool_id: impl Into<String>,
        compartment_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            pool_id: pool_id.into(),
            compartment_id: compartment_id.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for PoolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pool_id)
    }
}

/// One instance currently belonging to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMember {
    /// Provider identifier, used for monitoring queries.
    pub id: String,
    /// Host name, used to resolve scrape targets.
    pub display_name: String,
}

/// Result of a pool status query.
///
/// An empty `members` list is a valid answer; callers decide what it means.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolStatus {
    pub size: u32,
    pub members: Vec<PoolMember>,
}

/// Reads and resizes a managed pool.
///
/// `resize` returns once the provider has accepted the new target size; the
/// core does not poll for convergence.
#[async_trait]
pub trait PoolApi: Send + Sync {
    async fn pool_status(&self, pool: &PoolRef) -> anyhow::Result<PoolStatus>;

    async fn resize(&self, pool: &PoolRef, size: u32) -> anyhow::Result<()>;
}
