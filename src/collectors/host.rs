//! Host Metrics Collector
//!
//! Collects ESXi host memory, CPU and connection state.
//!
//! # Metrics Produced
//! - `esxi_memory_total_bytes`, `esxi_memory_usage_bytes`
//! - `esxi_cpu_total_mhz`, `esxi_cpu_usage_mhz`
//! - `esxi_connected_state`, `esxi_disconnected_state`, `esxi_not_responding_state`
//!   - Labels: host (flat) or host, datacenter, cluster (hierarchical)

use super::{collect_with_handler, join_partitions, CollectionStatus, PartitionContext};
use crate::vsphere::types::Datacenter;
use crate::vsphere::Scope;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Collects host metrics for one partition
///
/// # Returns
///
/// * `CollectionStatus::Success` - Snapshots fetched, one sample emitted per host and definition
/// * `CollectionStatus::Failed` - Listing or retrieval failed; nothing emitted (logged as warning)
pub async fn collect_host_partition(ctx: PartitionContext, scope: Scope) -> CollectionStatus {
    let hierarchy = scope.hierarchy_labels();
    let name = format!("hosts of {}", scope);

    collect_with_handler(&name, ctx.walker.hosts_under(&scope), |hosts| {
        for host in &hosts {
            for metric in ctx.registry.hosts() {
                ctx.emit(metric.sample(host, &hierarchy));
            }
        }
        debug!("Emitted samples for {} hosts of {}", hosts.len(), scope);
    })
    .await
}

/// Collects host metrics for every cluster of a datacenter, one task per cluster
///
/// Hosts outside any cluster are not visited. A datacenter without clusters
/// succeeds with no samples.
pub async fn collect_datacenter_hosts(
    ctx: PartitionContext,
    datacenter: Datacenter,
) -> CollectionStatus {
    let clusters = match ctx.walker.list_clusters(&datacenter).await {
        Ok(clusters) => clusters,
        Err(e) => {
            warn!(
                "Failed to list clusters of datacenter {}: {}",
                datacenter.name, e
            );
            return CollectionStatus::Failed;
        }
    };

    if clusters.is_empty() {
        debug!("Datacenter {} has no clusters", datacenter.name);
        return CollectionStatus::Success;
    }

    let mut tasks = JoinSet::new();
    for cluster in clusters {
        let scope = Scope::Cluster {
            datacenter: datacenter.clone(),
            cluster,
        };
        tasks.spawn(collect_host_partition(ctx.clone(), scope));
    }
    join_partitions(&mut tasks).await
}
