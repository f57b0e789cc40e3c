//! Hierarchy Walker
//!
//! Discovers the datacenter → cluster → host/datastore hierarchy and turns a
//! [`Scope`] into the object snapshots a collection task emits samples for.
//!
//! # Strategies
//!
//! - **Flat**: hosts and datastores are enumerated inventory-wide in one call each.
//!   Cheapest, but samples carry no datacenter or cluster label.
//! - **Hierarchical**: clusters are listed per datacenter and hosts per cluster;
//!   datastores are listed per datacenter, since they are not cluster children in
//!   the vSphere model. Hosts that belong to no cluster are not visited.
//!
//! An empty datacenter or cluster is not an error; it simply yields no objects.

use crate::error::Result;
use crate::fetcher::{with_deadline, PropertyFetcher};
use crate::vsphere::types::{Cluster, Datacenter, Datastore, HostSystem, ManagedObjectReference};
use crate::vsphere::Scope;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// How finely the inventory is partitioned, and therefore labeled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WalkStrategy {
    /// One partition per object kind over the whole inventory
    #[default]
    Flat,
    /// One partition per cluster (hosts) and per datacenter (datastores)
    Hierarchical,
}

impl fmt::Display for WalkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkStrategy::Flat => f.write_str("flat"),
            WalkStrategy::Hierarchical => f.write_str("hierarchical"),
        }
    }
}

#[derive(Clone)]
pub struct HierarchyWalker {
    fetcher: PropertyFetcher,
    strategy: WalkStrategy,
}

impl HierarchyWalker {
    pub fn new(fetcher: PropertyFetcher, strategy: WalkStrategy) -> Self {
        Self { fetcher, strategy }
    }

    pub fn strategy(&self) -> WalkStrategy {
        self.strategy
    }

    pub async fn list_datacenters(&self) -> Result<Vec<Datacenter>> {
        let inventory = self.fetcher.inventory();
        let datacenters = with_deadline(
            "listing datacenters",
            self.fetcher.call_timeout(),
            inventory.list_datacenters(),
        )
        .await?;
        debug!("Found {} datacenters", datacenters.len());
        Ok(datacenters)
    }

    pub async fn list_clusters(&self, datacenter: &Datacenter) -> Result<Vec<Cluster>> {
        let operation = format!("listing clusters of datacenter {}", datacenter.name);
        let clusters = with_deadline(
            &operation,
            self.fetcher.call_timeout(),
            self.fetcher.inventory().list_clusters(datacenter),
        )
        .await?;
        debug!(
            "Found {} clusters in datacenter {}",
            clusters.len(),
            datacenter.name
        );
        Ok(clusters)
    }

    pub async fn list_hosts_under(&self, scope: &Scope) -> Result<Vec<ManagedObjectReference>> {
        let operation = format!("listing hosts of {}", scope);
        with_deadline(
            &operation,
            self.fetcher.call_timeout(),
            self.fetcher.inventory().list_hosts(scope),
        )
        .await
    }

    pub async fn list_datastores_under(
        &self,
        scope: &Scope,
    ) -> Result<Vec<ManagedObjectReference>> {
        let operation = format!("listing datastores of {}", scope);
        with_deadline(
            &operation,
            self.fetcher.call_timeout(),
            self.fetcher.inventory().list_datastores(scope),
        )
        .await
    }

    /// Host snapshots for a scope
    ///
    /// The whole inventory is fetched in a single call; narrower scopes list their
    /// members first and then fetch them in bulk.
    pub async fn hosts_under(&self, scope: &Scope) -> Result<Vec<HostSystem>> {
        match scope {
            Scope::Inventory => self.fetcher.fetch_all().await,
            _ => {
                let refs = self.list_hosts_under(scope).await?;
                self.fetcher.fetch_by_references(&refs).await
            }
        }
    }

    /// Datastore snapshots for a scope
    pub async fn datastores_under(&self, scope: &Scope) -> Result<Vec<Datastore>> {
        match scope {
            Scope::Inventory => self.fetcher.fetch_all().await,
            _ => {
                let refs = self.list_datastores_under(scope).await?;
                self.fetcher.fetch_by_references(&refs).await
            }
        }
    }
}
