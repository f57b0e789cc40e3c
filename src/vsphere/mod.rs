//! vSphere inventory access
//!
//! The [`Inventory`] trait is the seam between the collection pipeline and the
//! vCenter. [`VsphereClient`] implements it over the JSON binding of the vSphere Web
//! Services API; tests substitute an in-memory implementation.

pub mod client;
pub mod session;
pub mod types;

pub use client::VsphereClient;
pub use session::SessionManager;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use types::{Cluster, Datacenter, ManagedObjectReference, ObjectContent};

/// Kinds of managed objects the exporter walks or reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Datacenter,
    Cluster,
    Host,
    Datastore,
}

impl ObjectKind {
    /// Managed object type name used on the wire
    pub fn managed_type(self) -> &'static str {
        match self {
            ObjectKind::Datacenter => "Datacenter",
            ObjectKind::Cluster => "ClusterComputeResource",
            ObjectKind::Host => "HostSystem",
            ObjectKind::Datastore => "Datastore",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.managed_type())
    }
}

/// Part of the inventory a listing or a collection task covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Everything below the root folder
    Inventory,
    Datacenter(Datacenter),
    Cluster {
        datacenter: Datacenter,
        cluster: Cluster,
    },
}

impl Scope {
    /// Hierarchy label values carried by samples from this scope:
    /// datacenter first, then cluster.
    pub fn hierarchy_labels(&self) -> Vec<String> {
        match self {
            Scope::Inventory => Vec::new(),
            Scope::Datacenter(datacenter) => vec![datacenter.name.clone()],
            Scope::Cluster {
                datacenter,
                cluster,
            } => vec![datacenter.name.clone(), cluster.name.clone()],
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Inventory => f.write_str("inventory"),
            Scope::Datacenter(datacenter) => write!(f, "datacenter {}", datacenter.name),
            Scope::Cluster {
                datacenter,
                cluster,
            } => write!(f, "cluster {}/{}", datacenter.name, cluster.name),
        }
    }
}

/// Read-only view of a vCenter inventory
///
/// Every method is a single logical request to the server. Implementations never
/// retry; callers decide how a failure degrades the poll.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// All datacenters below the root folder
    async fn list_datacenters(&self) -> Result<Vec<Datacenter>>;

    /// Clusters contained in one datacenter
    async fn list_clusters(&self, datacenter: &Datacenter) -> Result<Vec<Cluster>>;

    /// References to the hosts reachable from `scope`
    async fn list_hosts(&self, scope: &Scope) -> Result<Vec<ManagedObjectReference>>;

    /// References to the datastores reachable from `scope`
    async fn list_datastores(&self, scope: &Scope) -> Result<Vec<ManagedObjectReference>>;

    /// Bulk property retrieval for the given objects in one round trip
    async fn retrieve_properties(
        &self,
        kind: ObjectKind,
        refs: &[ManagedObjectReference],
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>>;

    /// Bulk property retrieval for every object of `kind` in the inventory
    async fn retrieve_all(&self, kind: ObjectKind, paths: &[&str]) -> Result<Vec<ObjectContent>>;
}
