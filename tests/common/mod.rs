//! Shared test fixtures: an in-memory vCenter inventory

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vsphere_exporter::collectors::{Collector, CollectorSettings};
use vsphere_exporter::error::{ExporterError, Result};
use vsphere_exporter::metrics::MetricRegistry;
use vsphere_exporter::vsphere::types::*;
use vsphere_exporter::vsphere::{Inventory, ObjectKind, Scope};
use vsphere_exporter::walker::WalkStrategy;

#[derive(Debug, Clone)]
pub struct FakeHost {
    pub name: String,
    pub memory_bytes: i64,
    pub memory_usage_mib: i64,
    pub cpu_mhz: i64,
    pub cores: i64,
    pub cpu_usage_mhz: i64,
    pub state: &'static str,
}

impl FakeHost {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            memory_bytes: 68_719_476_736,
            memory_usage_mib: 4096,
            cpu_mhz: 2200,
            cores: 16,
            cpu_usage_mhz: 800,
            state: "connected",
        }
    }

    fn reference(&self) -> ManagedObjectReference {
        ManagedObjectReference::new("HostSystem", format!("host:{}", self.name))
    }

    pub fn summary(&self) -> Value {
        json!({
            "_typeName": "HostListSummary",
            "hardware": {
                "_typeName": "HostHardwareSummary",
                "memorySize": self.memory_bytes,
                "cpuMhz": self.cpu_mhz,
                "numCpuCores": self.cores,
            },
            "runtime": {
                "_typeName": "HostRuntimeInfo",
                "connectionState": self.state,
                "powerState": "poweredOn",
            },
            "config": {
                "_typeName": "HostConfigSummary",
                "name": self.name,
            },
            "quickStats": {
                "_typeName": "HostListSummaryQuickStats",
                "overallCpuUsage": self.cpu_usage_mhz,
                "overallMemoryUsage": self.memory_usage_mib,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeDatastore {
    pub name: String,
    pub capacity: i64,
    pub free_space: i64,
    pub accessible: bool,
}

impl FakeDatastore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capacity: 2_000_000_000_000,
            free_space: 500_000_000_000,
            accessible: true,
        }
    }

    fn reference(&self) -> ManagedObjectReference {
        ManagedObjectReference::new("Datastore", format!("ds:{}", self.name))
    }

    pub fn summary(&self) -> Value {
        json!({
            "_typeName": "DatastoreSummary",
            "name": self.name,
            "capacity": self.capacity,
            "freeSpace": self.free_space,
            "accessible": self.accessible,
            "type": "VMFS",
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeCluster {
    pub name: String,
    pub hosts: Vec<FakeHost>,
}

#[derive(Debug, Clone)]
pub struct FakeDatacenter {
    pub name: String,
    pub clusters: Vec<FakeCluster>,
    pub datastores: Vec<FakeDatastore>,
}

pub fn cluster(name: &str, hosts: Vec<FakeHost>) -> FakeCluster {
    FakeCluster {
        name: name.to_string(),
        hosts,
    }
}

pub fn datacenter(
    name: &str,
    clusters: Vec<FakeCluster>,
    datastores: Vec<FakeDatastore>,
) -> FakeDatacenter {
    FakeDatacenter {
        name: name.to_string(),
        clusters,
        datastores,
    }
}

/// In-memory inventory
///
/// Calls are gated by key so individual partitions can be made to fail or hang:
/// `datacenters`, `clusters:{dc}`, `hosts:{cluster}`, `hosts:inventory`,
/// `datastores:{dc}`, `datastores:inventory`.
#[derive(Default)]
pub struct FakeInventory {
    pub datacenters: Vec<FakeDatacenter>,
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
    pub retrieve_calls: AtomicUsize,
}

impl FakeInventory {
    pub fn new(datacenters: Vec<FakeDatacenter>) -> Self {
        Self {
            datacenters,
            ..Default::default()
        }
    }

    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn hanging(mut self, key: &str) -> Self {
        self.hanging.insert(key.to_string());
        self
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    async fn gate(&self, key: &str) -> Result<()> {
        if self.hanging.contains(key) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(key) {
            return Err(ExporterError::Vsphere {
                fault: "HostCommunication".to_string(),
                message: format!("{} unreachable", key),
            });
        }
        Ok(())
    }

    fn all_hosts(&self) -> impl Iterator<Item = &FakeHost> {
        self.datacenters
            .iter()
            .flat_map(|dc| dc.clusters.iter())
            .flat_map(|c| c.hosts.iter())
    }

    fn all_datastores(&self) -> impl Iterator<Item = &FakeDatastore> {
        self.datacenters.iter().flat_map(|dc| dc.datastores.iter())
    }

    fn datacenter(&self, name: &str) -> Option<&FakeDatacenter> {
        self.datacenters.iter().find(|dc| dc.name == name)
    }

    fn host_contents<'a>(&self, hosts: impl Iterator<Item = &'a FakeHost>) -> Vec<ObjectContent> {
        hosts.map(|h| content(h.reference(), h.summary())).collect()
    }

    fn datastore_contents<'a>(
        &self,
        datastores: impl Iterator<Item = &'a FakeDatastore>,
    ) -> Vec<ObjectContent> {
        datastores.map(|d| content(d.reference(), d.summary())).collect()
    }
}

fn content(obj: ManagedObjectReference, summary: Value) -> ObjectContent {
    ObjectContent {
        obj,
        prop_set: vec![DynamicProperty {
            name: "summary".to_string(),
            val: summary,
        }],
    }
}

#[async_trait]
impl Inventory for FakeInventory {
    async fn list_datacenters(&self) -> Result<Vec<Datacenter>> {
        self.gate("datacenters").await?;
        Ok(self
            .datacenters
            .iter()
            .map(|dc| Datacenter {
                reference: ManagedObjectReference::new("Datacenter", format!("dc:{}", dc.name)),
                name: dc.name.clone(),
            })
            .collect())
    }

    async fn list_clusters(&self, datacenter: &Datacenter) -> Result<Vec<Cluster>> {
        self.gate(&format!("clusters:{}", datacenter.name)).await?;
        Ok(self
            .datacenter(&datacenter.name)
            .map(|dc| {
                dc.clusters
                    .iter()
                    .map(|c| Cluster {
                        reference: ManagedObjectReference::new(
                            "ClusterComputeResource",
                            format!("cluster:{}/{}", dc.name, c.name),
                        ),
                        name: c.name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_hosts(&self, scope: &Scope) -> Result<Vec<ManagedObjectReference>> {
        match scope {
            Scope::Inventory => {
                self.gate("hosts:inventory").await?;
                Ok(self.all_hosts().map(FakeHost::reference).collect())
            }
            Scope::Datacenter(datacenter) => Ok(self
                .datacenter(&datacenter.name)
                .into_iter()
                .flat_map(|dc| dc.clusters.iter())
                .flat_map(|c| c.hosts.iter())
                .map(FakeHost::reference)
                .collect()),
            Scope::Cluster {
                datacenter,
                cluster,
            } => {
                self.gate(&format!("hosts:{}", cluster.name)).await?;
                Ok(self
                    .datacenter(&datacenter.name)
                    .and_then(|dc| dc.clusters.iter().find(|c| c.name == cluster.name))
                    .map(|c| c.hosts.iter().map(FakeHost::reference).collect())
                    .unwrap_or_default())
            }
        }
    }

    async fn list_datastores(&self, scope: &Scope) -> Result<Vec<ManagedObjectReference>> {
        match scope {
            Scope::Inventory => {
                self.gate("datastores:inventory").await?;
                Ok(self.all_datastores().map(FakeDatastore::reference).collect())
            }
            Scope::Datacenter(datacenter) | Scope::Cluster { datacenter, .. } => {
                self.gate(&format!("datastores:{}", datacenter.name)).await?;
                Ok(self
                    .datacenter(&datacenter.name)
                    .map(|dc| dc.datastores.iter().map(FakeDatastore::reference).collect())
                    .unwrap_or_default())
            }
        }
    }

    async fn retrieve_properties(
        &self,
        kind: ObjectKind,
        refs: &[ManagedObjectReference],
        _paths: &[&str],
    ) -> Result<Vec<ObjectContent>> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        let wanted: HashSet<&str> = refs.iter().map(|r| r.value.as_str()).collect();
        Ok(match kind {
            ObjectKind::Host => self.host_contents(
                self.all_hosts()
                    .filter(|h| wanted.contains(h.reference().value.as_str())),
            ),
            ObjectKind::Datastore => self.datastore_contents(
                self.all_datastores()
                    .filter(|d| wanted.contains(d.reference().value.as_str())),
            ),
            _ => Vec::new(),
        })
    }

    async fn retrieve_all(&self, kind: ObjectKind, _paths: &[&str]) -> Result<Vec<ObjectContent>> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        match kind {
            ObjectKind::Host => {
                self.gate("hosts:inventory").await?;
                Ok(self.host_contents(self.all_hosts()))
            }
            ObjectKind::Datastore => {
                self.gate("datastores:inventory").await?;
                Ok(self.datastore_contents(self.all_datastores()))
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Host from the reference scenario: 16 GiB, 2048 MiB used, 8 × 2600 MHz, 1200 MHz used
pub fn reference_host() -> FakeHost {
    FakeHost {
        name: "esxi-01.lab".to_string(),
        memory_bytes: 17_179_869_184,
        memory_usage_mib: 2048,
        cpu_mhz: 2600,
        cores: 8,
        cpu_usage_mhz: 1200,
        state: "connected",
    }
}

/// Datastore from the reference scenario: 1 TB, 250 GB free, inaccessible
pub fn reference_datastore() -> FakeDatastore {
    FakeDatastore {
        name: "datastore1".to_string(),
        capacity: 1_000_000_000_000,
        free_space: 250_000_000_000,
        accessible: false,
    }
}

pub fn settings() -> CollectorSettings {
    CollectorSettings {
        call_timeout: Duration::from_secs(2),
        poll_timeout: Duration::from_secs(5),
        collect_hosts: true,
        collect_datastores: true,
    }
}

pub fn collector(
    inventory: FakeInventory,
    strategy: WalkStrategy,
    settings: CollectorSettings,
) -> (Collector, Arc<FakeInventory>) {
    let inventory = Arc::new(inventory);
    let collector = Collector::new(inventory.clone(), MetricRegistry::new(strategy), settings);
    (collector, inventory)
}
