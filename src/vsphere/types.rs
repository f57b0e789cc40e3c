//! vSphere API Type Definitions
//!
//! Rust structs for the subset of the vSphere Web Services object model the
//! exporter reads, as served by the JSON binding (`/sdk/vim25/{release}`).
//!
//! # Design Notes
//!
//! - **Field names**: the JSON binding uses the camelCase names of the WSDL, so most
//!   structs carry `#[serde(rename_all = "camelCase")]`.
//! - **Polymorphism**: data objects carry a `_typeName` discriminator. Requests must
//!   send it; responses are decoded by shape and the discriminator is ignored.
//! - **Summaries**: `#[serde(default)]` is used on every summary field the exporter
//!   reads, so a field the server omits (quick stats of a disconnected host, for
//!   example) decodes to zero instead of failing the whole partition. Only fields
//!   that feed a metric or a log line are modeled; serde skips the rest.
//!
//! # Objects Covered
//!
//! - `ServiceInstance.content` → [`ServiceContent`], [`AboutInfo`]
//! - `RetrievePropertiesEx` → [`RetrieveResult`], [`ObjectContent`], [`DynamicProperty`]
//! - `HostSystem.summary` → [`HostListSummary`]
//! - `Datastore.summary` → [`DatastoreSummary`]

use serde::{Deserialize, Serialize};
use std::fmt;

fn moref_type_name() -> String {
    "ManagedObjectReference".to_string()
}

/// Reference to a server-side managed object, e.g. `HostSystem:host-42`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "_typeName", default = "moref_type_name")]
    type_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: moref_type_name(),
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Root object returned by `ServiceInstance.content`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    pub root_folder: ManagedObjectReference,
    pub property_collector: ManagedObjectReference,
    pub view_manager: ManagedObjectReference,
    pub session_manager: ManagedObjectReference,
    #[serde(default)]
    pub about: Option<AboutInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutInfo {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub api_version: String,
}

/// Fault body returned with a non-2xx status
#[derive(Debug, Deserialize)]
pub struct VimFault {
    #[serde(rename = "_typeName")]
    pub type_name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "faultMessage")]
    pub fault_message: Vec<LocalizableMessage>,
}

impl VimFault {
    /// Best human-readable description the server gave us
    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.fault_message.iter().find_map(|m| m.message.clone()))
            .unwrap_or_else(|| "no message".to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct LocalizableMessage {
    #[serde(default)]
    pub message: Option<String>,
}

/// Result page of `RetrievePropertiesEx` / `ContinueRetrievePropertiesEx`
#[derive(Debug, Deserialize, Default)]
pub struct RetrieveResult {
    #[serde(default)]
    pub objects: Vec<ObjectContent>,
    #[serde(default)]
    pub token: Option<String>,
}

/// One object's requested properties
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectContent {
    pub obj: ManagedObjectReference,
    #[serde(default, rename = "propSet")]
    pub prop_set: Vec<DynamicProperty>,
}

impl ObjectContent {
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.prop_set
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.val)
    }

    pub fn take_property(&mut self, name: &str) -> Option<serde_json::Value> {
        let index = self.prop_set.iter().position(|p| p.name == name)?;
        Some(self.prop_set.swap_remove(index).val)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DynamicProperty {
    pub name: String,
    pub val: serde_json::Value,
}

/// Datacenter discovered under the root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datacenter {
    pub reference: ManagedObjectReference,
    pub name: String,
}

/// Cluster (`ClusterComputeResource`) within a datacenter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub reference: ManagedObjectReference,
    pub name: String,
}

/// Snapshot of one ESXi host for the current poll
#[derive(Debug, Clone)]
pub struct HostSystem {
    pub reference: ManagedObjectReference,
    pub summary: HostListSummary,
}

/// Snapshot of one datastore for the current poll
#[derive(Debug, Clone)]
pub struct Datastore {
    pub reference: ManagedObjectReference,
    pub summary: DatastoreSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostListSummary {
    #[serde(default)]
    pub hardware: HostHardwareSummary,
    #[serde(default)]
    pub runtime: HostRuntimeInfo,
    #[serde(default)]
    pub config: HostConfigSummary,
    #[serde(default)]
    pub quick_stats: HostQuickStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostHardwareSummary {
    /// Physical memory in bytes
    #[serde(default)]
    pub memory_size: i64,
    #[serde(default)]
    pub cpu_mhz: i64,
    #[serde(default)]
    pub num_cpu_cores: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRuntimeInfo {
    #[serde(default)]
    pub connection_state: HostConnectionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostConnectionState {
    Connected,
    Disconnected,
    NotResponding,
    /// Any state a newer server may add
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfigSummary {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostQuickStats {
    /// Aggregated CPU usage across all cores, in MHz
    #[serde(default)]
    pub overall_cpu_usage: i64,
    /// Physical memory usage, in MiB
    #[serde(default)]
    pub overall_memory_usage: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreSummary {
    #[serde(default)]
    pub name: String,
    /// Maximum capacity in bytes
    #[serde(default)]
    pub capacity: i64,
    /// Available space in bytes
    #[serde(default)]
    pub free_space: i64,
    #[serde(default)]
    pub accessible: bool,
}
