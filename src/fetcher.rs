//! Property Fetcher
//!
//! Bulk retrieval of object snapshots. Both entry points cost exactly one logical
//! request to the vCenter regardless of how many objects they return, which keeps
//! the outbound call count proportional to the number of partitions walked rather
//! than the number of hosts or datastores.
//!
//! Every call is bounded by the per-call deadline; an expired deadline is reported
//! as [`ExporterError::Timeout`] and is handled by the caller like any other failure.

use crate::error::{ExporterError, Result};
use crate::vsphere::types::{
    Datastore, DatastoreSummary, HostListSummary, HostSystem, ManagedObjectReference,
    ObjectContent,
};
use crate::vsphere::{Inventory, ObjectKind};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A snapshot type that can be decoded from retrieved properties
pub trait InventoryObject: Sized + Send + 'static {
    const KIND: ObjectKind;
    /// Property paths requested from the server
    const PROPERTIES: &'static [&'static str];

    fn from_content(content: ObjectContent) -> Result<Self>;
}

impl InventoryObject for HostSystem {
    const KIND: ObjectKind = ObjectKind::Host;
    const PROPERTIES: &'static [&'static str] = &["summary"];

    fn from_content(mut content: ObjectContent) -> Result<Self> {
        let summary: HostListSummary = decode_summary(&mut content)?;
        Ok(HostSystem {
            reference: content.obj,
            summary,
        })
    }
}

impl InventoryObject for Datastore {
    const KIND: ObjectKind = ObjectKind::Datastore;
    const PROPERTIES: &'static [&'static str] = &["summary"];

    fn from_content(mut content: ObjectContent) -> Result<Self> {
        let summary: DatastoreSummary = decode_summary(&mut content)?;
        Ok(Datastore {
            reference: content.obj,
            summary,
        })
    }
}

fn decode_summary<T>(content: &mut ObjectContent) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let value = content.take_property("summary").ok_or_else(|| ExporterError::Vsphere {
        fault: "MissingProperty".to_string(),
        message: format!("{} returned no summary", content.obj),
    })?;
    Ok(serde_json::from_value(value)?)
}

/// Run `call`, failing with [`ExporterError::Timeout`] once `after` has elapsed
pub async fn with_deadline<T, F>(operation: &str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(ExporterError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

/// Retrieves snapshots in bulk from an [`Inventory`]
#[derive(Clone)]
pub struct PropertyFetcher {
    inventory: Arc<dyn Inventory>,
    call_timeout: Duration,
}

impl PropertyFetcher {
    pub fn new(inventory: Arc<dyn Inventory>, call_timeout: Duration) -> Self {
        Self {
            inventory,
            call_timeout,
        }
    }

    pub fn inventory(&self) -> &Arc<dyn Inventory> {
        &self.inventory
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Snapshots of exactly the referenced objects
    ///
    /// An empty reference list yields no snapshots and sends nothing.
    pub async fn fetch_by_references<T: InventoryObject>(
        &self,
        refs: &[ManagedObjectReference],
    ) -> Result<Vec<T>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let operation = format!("retrieving {} {} objects", refs.len(), T::KIND);
        let contents = with_deadline(
            &operation,
            self.call_timeout,
            self.inventory
                .retrieve_properties(T::KIND, refs, T::PROPERTIES),
        )
        .await?;

        debug!("Retrieved {} of {} {} objects", contents.len(), refs.len(), T::KIND);
        contents.into_iter().map(T::from_content).collect()
    }

    /// Snapshots of every object of the kind in the whole inventory
    pub async fn fetch_all<T: InventoryObject>(&self) -> Result<Vec<T>> {
        let operation = format!("retrieving all {} objects", T::KIND);
        let contents = with_deadline(
            &operation,
            self.call_timeout,
            self.inventory.retrieve_all(T::KIND, T::PROPERTIES),
        )
        .await?;

        debug!("Retrieved {} {} objects", contents.len(), T::KIND);
        contents.into_iter().map(T::from_content).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vsphere::types::DynamicProperty;
    use serde_json::json;

    fn content(summary: Option<serde_json::Value>) -> ObjectContent {
        ObjectContent {
            obj: ManagedObjectReference::new("Datastore", "datastore-11"),
            prop_set: summary
                .map(|val| {
                    vec![DynamicProperty {
                        name: "summary".to_string(),
                        val,
                    }]
                })
                .unwrap_or_default(),
        }
    }

    #[test]
    fn decodes_datastore_summary() {
        let ds = Datastore::from_content(content(Some(json!({
            "_typeName": "DatastoreSummary",
            "name": "vsanDatastore",
            "capacity": 1000,
            "freeSpace": 250,
            "accessible": true,
            "type": "vsan"
        }))))
        .expect("summary should decode");

        assert_eq!(ds.reference.value, "datastore-11");
        assert_eq!(ds.summary.name, "vsanDatastore");
        assert_eq!(ds.summary.free_space, 250);
        assert!(ds.summary.accessible);
    }

    #[test]
    fn missing_summary_is_an_error() {
        let err = Datastore::from_content(content(None)).unwrap_err();
        assert!(err.to_string().contains("no summary"));
    }

    #[tokio::test]
    async fn deadline_turns_a_hung_call_into_timeout() {
        let result: Result<()> = with_deadline(
            "listing datacenters",
            Duration::from_millis(10),
            std::future::pending(),
        )
        .await;

        match result {
            Err(ExporterError::Timeout { operation, .. }) => {
                assert_eq!(operation, "listing datacenters")
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
