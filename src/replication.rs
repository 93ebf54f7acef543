//! Replication Module
//!
//! Contracts for the external replicated-storage collaborator. The engine
//! defines no wire format; it only propagates local mutations outward and
//! applies inbound remote notices.
//!
//! Echo safety: outbound propagation happens only for local-origin
//! mutations, and applying a remote notice never calls the agent, so a
//! replicated write cannot loop back around the cluster.

use async_trait::async_trait;

// == Replication Agent Trait ==
/// Outbound side of the replication collaborator.
///
/// Called after a local mutation commits on a cache whose configuration is
/// distributed or replicated. Delivery failures are logged by the cache and
/// never affect the already-committed local state.
#[async_trait]
pub trait ReplicationAgent<K, V>: Send + Sync {
    /// Propagates a committed local insert to other cluster members.
    ///
    /// `generation` is the insertion sequence number assigned to the entry.
    /// The transport must carry it, so an echo of this put arrives back as a
    /// [`RemoteNotice::Put`] with the same generation and is suppressed.
    async fn propagate_put(
        &self,
        cache_name: &str,
        key: &K,
        value: &V,
        generation: u64,
    ) -> anyhow::Result<()>;

    /// Propagates a committed local removal.
    async fn propagate_remove(&self, cache_name: &str, key: &K) -> anyhow::Result<()>;

    /// Propagates a committed local clear.
    async fn propagate_clear(&self, cache_name: &str) -> anyhow::Result<()>;
}

// == Remote Notice ==
/// Inbound mutation notice delivered by the replication collaborator.
#[derive(Debug, Clone)]
pub enum RemoteNotice<K, V> {
    /// A put committed on another member.
    ///
    /// `generation` is the originating member's insertion sequence number;
    /// re-delivery of a generation already applied is a no-op.
    Put { key: K, value: V, generation: u64 },
    /// A removal committed on another member.
    Remove { key: K },
    /// A whole-cache clear committed on another member.
    Clear,
}

// == Notice Phase ==
/// Pre/post marker attached to each delivery.
///
/// Removals are applied at `Pre`, while the value is still readable for the
/// listener notification; puts and clears are applied at `Post`. Deliveries
/// at the other phase are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticePhase {
    /// Before the mutation takes effect; values remain readable
    Pre,
    /// After the mutation has taken effect
    Post,
}
