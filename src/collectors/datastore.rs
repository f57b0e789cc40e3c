//! Datastore Metrics Collector
//!
//! # Metrics Produced
//! - `datastore_capacity_bytes` - Datastore capacity
//! - `datastore_free_space_bytes` - Datastore free space
//! - `datastore_accessibility` - Connectivity status (1=accessible, 0=inaccessible)
//!   - Labels: name (flat) or name, datacenter (hierarchical)

use super::{collect_with_handler, CollectionStatus, PartitionContext};
use crate::vsphere::Scope;
use tracing::debug;

/// Collects datastore metrics for one partition
///
/// Datastores are never attributed to a cluster, so `scope` is either the whole
/// inventory or one datacenter.
pub async fn collect_datastore_partition(ctx: PartitionContext, scope: Scope) -> CollectionStatus {
    let hierarchy = scope.hierarchy_labels();
    let name = format!("datastores of {}", scope);

    collect_with_handler(&name, ctx.walker.datastores_under(&scope), |datastores| {
        for datastore in &datastores {
            for metric in ctx.registry.datastores() {
                ctx.emit(metric.sample(datastore, &hierarchy));
            }
        }
        debug!(
            "Emitted samples for {} datastores of {}",
            datastores.len(),
            scope
        );
    })
    .await
}
