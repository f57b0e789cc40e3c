//! Metric Definition Registry
//!
//! Declares every gauge the exporter emits and how each is computed from an
//! inventory snapshot.
//!
//! # Metric Families
//!
//! ## Hosts (`esxi_` prefix)
//! - Memory size and usage in bytes
//! - Total CPU capacity and CPU usage in MHz
//! - One boolean gauge per connection state (connected, disconnected, not responding)
//!
//! ## Datastores (`datastore_` prefix)
//! - Capacity and free space in bytes
//! - Accessibility (1 = accessible)
//!
//! ## Scrape level (`vsphere_` namespace)
//! - `vsphere_vcenter_available`, appended to every poll by the orchestrator
//! - `vsphere_up`, added by the exposition layer
//!
//! # Labels
//!
//! A definition's label values are its own extracted labels followed by the
//! hierarchy labels of the partition that emitted it (datacenter, then cluster).
//! Which hierarchy labels exist depends on the [`WalkStrategy`], so the registry is
//! built for one strategy at startup and never changes afterwards.

use crate::vsphere::types::{Datastore, HostConnectionState, HostSystem};
use crate::walker::WalkStrategy;
use std::sync::Arc;

pub const NAMESPACE: &str = "vsphere";
pub const ESXI_PREFIX: &str = "esxi_";
pub const DATASTORE_PREFIX: &str = "datastore_";

const MEBIBYTE: f64 = 1024.0 * 1024.0;

/// Name, help and label names shared by every sample of one family
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
}

/// One metric reading for one object
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    desc: Arc<MetricDesc>,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    pub fn new(desc: Arc<MetricDesc>, value: f64, label_values: Vec<String>) -> Self {
        Self {
            desc,
            value,
            label_values,
        }
    }

    pub fn desc(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Value of the label called `name`, if the family declares it
    pub fn label(&self, name: &str) -> Option<&str> {
        let index = self.desc.label_names.iter().position(|n| n == name)?;
        self.label_values.get(index).map(String::as_str)
    }
}

/// Computes a gauge value from a snapshot
pub trait ValueExtractor: Copy + Send + Sync + 'static {
    type Object;
    fn extract(self, object: &Self::Object) -> f64;
}

/// Computes one label value from a snapshot
pub trait LabelExtractor: Copy + Send + Sync + 'static {
    type Object;
    fn extract(self, object: &Self::Object) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostValue {
    MemoryTotalBytes,
    /// Quick stats report MiB
    MemoryUsageBytes,
    /// Clock rate times physical cores
    CpuTotalMhz,
    CpuUsageMhz,
    /// 1 when the host is in exactly this state
    ConnectionState(HostConnectionState),
}

impl ValueExtractor for HostValue {
    type Object = HostSystem;

    fn extract(self, host: &HostSystem) -> f64 {
        let summary = &host.summary;
        match self {
            HostValue::MemoryTotalBytes => summary.hardware.memory_size as f64,
            HostValue::MemoryUsageBytes => {
                summary.quick_stats.overall_memory_usage as f64 * MEBIBYTE
            }
            HostValue::CpuTotalMhz => {
                (summary.hardware.cpu_mhz * summary.hardware.num_cpu_cores) as f64
            }
            HostValue::CpuUsageMhz => summary.quick_stats.overall_cpu_usage as f64,
            HostValue::ConnectionState(state) => flag(summary.runtime.connection_state == state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLabel {
    Name,
}

impl LabelExtractor for HostLabel {
    type Object = HostSystem;

    fn extract(self, host: &HostSystem) -> String {
        match self {
            HostLabel::Name => host.summary.config.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreValue {
    CapacityBytes,
    FreeSpaceBytes,
    Accessibility,
}

impl ValueExtractor for DatastoreValue {
    type Object = Datastore;

    fn extract(self, datastore: &Datastore) -> f64 {
        let summary = &datastore.summary;
        match self {
            DatastoreValue::CapacityBytes => summary.capacity as f64,
            DatastoreValue::FreeSpaceBytes => summary.free_space as f64,
            DatastoreValue::Accessibility => flag(summary.accessible),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreLabel {
    Name,
}

impl LabelExtractor for DatastoreLabel {
    type Object = Datastore;

    fn extract(self, datastore: &Datastore) -> String {
        match self {
            DatastoreLabel::Name => datastore.summary.name.clone(),
        }
    }
}

fn flag(set: bool) -> f64 {
    if set {
        1.0
    } else {
        0.0
    }
}

/// A gauge family: its descriptor plus how to compute value and labels
#[derive(Debug, Clone)]
pub struct MetricDefinition<V, L> {
    desc: Arc<MetricDesc>,
    value: V,
    labels: Vec<L>,
}

impl<V, L> MetricDefinition<V, L> {
    /// Assemble a definition. Pure data, cannot fail.
    pub fn register(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
        value: V,
        labels: Vec<L>,
    ) -> Self {
        Self {
            desc: Arc::new(MetricDesc {
                name: name.into(),
                help: help.into(),
                label_names: label_names.iter().map(|n| n.to_string()).collect(),
            }),
            value,
            labels,
        }
    }

    pub fn desc(&self) -> &Arc<MetricDesc> {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// Number of trailing label names filled in from the partition, not the object
    pub fn hierarchy_label_count(&self) -> usize {
        self.desc.label_names.len().saturating_sub(self.labels.len())
    }
}

impl<V, L> MetricDefinition<V, L>
where
    V: ValueExtractor,
    L: LabelExtractor<Object = V::Object>,
{
    /// Build the sample for one object; `hierarchy` holds datacenter then cluster
    pub fn sample(&self, object: &V::Object, hierarchy: &[String]) -> Sample {
        let mut label_values: Vec<String> = self.labels.iter().map(|l| l.extract(object)).collect();
        label_values.extend(hierarchy.iter().cloned());
        debug_assert_eq!(
            label_values.len(),
            self.desc.label_names.len(),
            "label count mismatch for {}",
            self.desc.name
        );
        Sample::new(Arc::clone(&self.desc), self.value.extract(object), label_values)
    }
}

pub type HostMetric = MetricDefinition<HostValue, HostLabel>;
pub type DatastoreMetric = MetricDefinition<DatastoreValue, DatastoreLabel>;

/// Every metric family the exporter emits, built once at startup
#[derive(Debug)]
pub struct MetricRegistry {
    strategy: WalkStrategy,
    hosts: Vec<HostMetric>,
    datastores: Vec<DatastoreMetric>,
    availability: Arc<MetricDesc>,
}

impl MetricRegistry {
    pub fn new(strategy: WalkStrategy) -> Self {
        let (host_labels, datastore_labels): (&[&str], &[&str]) = match strategy {
            WalkStrategy::Flat => (&["host"][..], &["name"][..]),
            WalkStrategy::Hierarchical => (
                &["host", "datacenter", "cluster"][..],
                &["name", "datacenter"][..],
            ),
        };

        let host = |suffix: &str, help: &str, value: HostValue| {
            HostMetric::register(
                format!("{}{}", ESXI_PREFIX, suffix),
                help,
                host_labels,
                value,
                vec![HostLabel::Name],
            )
        };
        let hosts = vec![
            host("memory_total_bytes", "Size of the esxi memory", HostValue::MemoryTotalBytes),
            host(
                "memory_usage_bytes",
                "Memory usage of the ESXi host",
                HostValue::MemoryUsageBytes,
            ),
            host("cpu_total_mhz", "Total cpu available", HostValue::CpuTotalMhz),
            host("cpu_usage_mhz", "CPU usage", HostValue::CpuUsageMhz),
            host(
                "connected_state",
                "Esxi host connected state",
                HostValue::ConnectionState(HostConnectionState::Connected),
            ),
            host(
                "disconnected_state",
                "Esxi host disconnected state",
                HostValue::ConnectionState(HostConnectionState::Disconnected),
            ),
            host(
                "not_responding_state",
                "Esxi host not responding state",
                HostValue::ConnectionState(HostConnectionState::NotResponding),
            ),
        ];

        let datastore = |suffix: &str, help: &str, value: DatastoreValue| {
            DatastoreMetric::register(
                format!("{}{}", DATASTORE_PREFIX, suffix),
                help,
                datastore_labels,
                value,
                vec![DatastoreLabel::Name],
            )
        };
        let datastores = vec![
            datastore("capacity_bytes", "Datastore capacity", DatastoreValue::CapacityBytes),
            datastore(
                "free_space_bytes",
                "Datastore free space",
                DatastoreValue::FreeSpaceBytes,
            ),
            datastore(
                "accessibility",
                "Datastore connectivity status",
                DatastoreValue::Accessibility,
            ),
        ];

        let availability = Arc::new(MetricDesc {
            name: format!("{}_vcenter_available", NAMESPACE),
            help: "Set to 1 if the vcenter is available".to_string(),
            label_names: Vec::new(),
        });

        Self {
            strategy,
            hosts,
            datastores,
            availability,
        }
    }

    /// Strategy whose hierarchy labels the families declare
    pub fn strategy(&self) -> WalkStrategy {
        self.strategy
    }

    /// Host definitions in emission order
    pub fn hosts(&self) -> &[HostMetric] {
        &self.hosts
    }

    /// Datastore definitions in emission order
    pub fn datastores(&self) -> &[DatastoreMetric] {
        &self.datastores
    }

    pub fn availability_sample(&self, available: bool) -> Sample {
        Sample::new(Arc::clone(&self.availability), flag(available), Vec::new())
    }
}
