//! vSphere Inventory Client
//!
//! Implements [`Inventory`] on top of the JSON binding of the vSphere Web Services API.
//!
//! # Architecture
//!
//! - **Session**: [`SessionManager`] logs in once and attaches the session id to every call
//! - **Enumeration**: `ContainerView`s rooted at the root folder (cached per session) or at a
//!   datacenter (created and destroyed per listing)
//! - **View lifetime**: a view that is not cached is owned by a `ViewGuard`, which still
//!   destroys it when the listing is cancelled by a deadline
//! - **Bulk retrieval**: `PropertyCollector.RetrievePropertiesEx`, one request for any number
//!   of objects, followed by `ContinueRetrievePropertiesEx` only when the server pages
//!
//! # Example
//!
//! ```no_run
//! use vsphere_exporter::config::VsphereConfig;
//! use vsphere_exporter::vsphere::{Inventory, VsphereClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = VsphereClient::new(VsphereConfig::default())?;
//! client.connect().await?;
//! let datacenters = client.list_datacenters().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::VsphereConfig;
use crate::error::{ExporterError, Result};
use crate::vsphere::session::{SessionHandle, SessionManager};
use crate::vsphere::types::*;
use crate::vsphere::{Inventory, ObjectKind, Scope};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Client for the vSphere JSON API
///
/// `Send` and `Sync`; one instance is shared by every collection task of a poll.
pub struct VsphereClient {
    session: Arc<SessionManager>,
}

/// A container view destroyed when the guard goes away
///
/// [`ViewGuard::destroy`] destroys it in place. Dropping an armed guard, which
/// happens when a deadline cancels the listing mid-flight, spawns the
/// `DestroyView` call on the current runtime instead.
struct ViewGuard {
    session: Arc<SessionManager>,
    session_id: String,
    view: ManagedObjectReference,
    armed: bool,
}

impl ViewGuard {
    fn view(&self) -> &ManagedObjectReference {
        &self.view
    }

    /// Hand the view over to the caller without destroying it
    fn keep(mut self) -> ManagedObjectReference {
        self.armed = false;
        self.view.clone()
    }

    async fn destroy(mut self) {
        self.armed = false;
        destroy_view(&self.session, &self.session_id, &self.view).await;
    }
}

impl Drop for ViewGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let session = Arc::clone(&self.session);
        let session_id = std::mem::take(&mut self.session_id);
        let view = self.view.clone();
        match Handle::try_current() {
            Ok(handle) => {
                debug!("Listing cancelled, destroying {} in the background", view);
                handle.spawn(async move {
                    destroy_view(&session, &session_id, &view).await;
                });
            }
            Err(_) => warn!("No runtime to destroy {}, it lives until logout", view),
        }
    }
}

async fn destroy_view(session: &SessionManager, session_id: &str, view: &ManagedObjectReference) {
    if let Err(e) = session
        .invoke_in_session::<Value>(session_id, view, "DestroyView", json!({}))
        .await
    {
        warn!("Failed to destroy {}: {}", view, e);
    }
}

impl VsphereClient {
    pub fn new(config: VsphereConfig) -> Result<Self> {
        let session = SessionManager::new(Arc::new(config))?;
        Ok(Self {
            session: Arc::new(session),
        })
    }

    /// Log in eagerly so that bad credentials surface at startup
    pub async fn connect(&self) -> Result<()> {
        self.session.ensure_logged_in().await.map(|_| ())
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    async fn create_container_view(
        &self,
        session: &SessionHandle,
        container: &ManagedObjectReference,
        kind: ObjectKind,
    ) -> Result<ViewGuard> {
        let body = json!({
            "container": container,
            "type": [kind.managed_type()],
            "recursive": true,
        });
        let view: ManagedObjectReference = self
            .session
            .invoke_in_session(
                &session.id,
                &session.content.view_manager,
                "CreateContainerView",
                body,
            )
            .await?
            .ok_or_else(|| ExporterError::Vsphere {
                fault: "EmptyResponse".to_string(),
                message: "CreateContainerView returned no view".to_string(),
            })?;
        Ok(ViewGuard {
            session: Arc::clone(&self.session),
            session_id: session.id.clone(),
            view,
            armed: true,
        })
    }

    /// Root-folder view of every object of `kind`, cached for the session lifetime
    ///
    /// Concurrent first callers may each create a view; the first one cached wins
    /// and the others are destroyed.
    async fn inventory_view(&self, kind: ObjectKind) -> Result<ManagedObjectReference> {
        let session = self.session.ensure_logged_in().await?;
        if let Some(view) = self.session.cached_view(&session.id, kind).await {
            return Ok(view);
        }

        let guard = self
            .create_container_view(&session, &session.content.root_folder, kind)
            .await?;
        let existing = self
            .session
            .remember_view(&session.id, kind, guard.view().clone())
            .await;
        match existing {
            Some(existing) => {
                debug!(
                    "Inventory view for {} already cached, dropping {}",
                    kind,
                    guard.view()
                );
                guard.destroy().await;
                Ok(existing)
            }
            None => {
                debug!("Created inventory view {} for {}", guard.view(), kind);
                Ok(guard.keep())
            }
        }
    }

    /// Run one property filter, following continuation tokens
    async fn retrieve(&self, filter: Value) -> Result<Vec<ObjectContent>> {
        let session = self.session.ensure_logged_in().await?;
        let collector = &session.content.property_collector;

        let body = json!({
            "specSet": [filter],
            "options": { "_typeName": "RetrieveOptions" },
        });
        let mut page: RetrieveResult = self
            .session
            .invoke(collector, "RetrievePropertiesEx", body)
            .await?
            .unwrap_or_default();

        let mut objects = std::mem::take(&mut page.objects);
        while let Some(token) = page.token.take() {
            page = self
                .session
                .invoke(collector, "ContinueRetrievePropertiesEx", json!({ "token": token }))
                .await?
                .unwrap_or_default();
            objects.append(&mut page.objects);
        }

        Ok(objects)
    }

    async fn retrieve_from_view(
        &self,
        view: &ManagedObjectReference,
        kind: ObjectKind,
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>> {
        self.retrieve(view_filter(view, kind, paths)).await
    }

    /// Enumerate `kind` below `container` through a short-lived view
    async fn list_in_container(
        &self,
        container: &ManagedObjectReference,
        kind: ObjectKind,
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>> {
        let session = self.session.ensure_logged_in().await?;
        let guard = self.create_container_view(&session, container, kind).await?;
        let result = self.retrieve_from_view(guard.view(), kind, paths).await;
        guard.destroy().await;
        result
    }

    async fn reference_list(
        &self,
        target: &ManagedObjectReference,
        property: &str,
    ) -> Result<Vec<ManagedObjectReference>> {
        Ok(self
            .session
            .property::<Vec<ManagedObjectReference>>(target, property)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl Inventory for VsphereClient {
    async fn list_datacenters(&self) -> Result<Vec<Datacenter>> {
        let view = self.inventory_view(ObjectKind::Datacenter).await?;
        let objects = self
            .retrieve_from_view(&view, ObjectKind::Datacenter, &["name"])
            .await?;
        Ok(named(objects)
            .map(|(reference, name)| Datacenter { reference, name })
            .collect())
    }

    async fn list_clusters(&self, datacenter: &Datacenter) -> Result<Vec<Cluster>> {
        let objects = self
            .list_in_container(&datacenter.reference, ObjectKind::Cluster, &["name"])
            .await?;
        Ok(named(objects)
            .map(|(reference, name)| Cluster { reference, name })
            .collect())
    }

    async fn list_hosts(&self, scope: &Scope) -> Result<Vec<ManagedObjectReference>> {
        let objects = match scope {
            Scope::Inventory => {
                let view = self.inventory_view(ObjectKind::Host).await?;
                self.retrieve_from_view(&view, ObjectKind::Host, &["name"])
                    .await?
            }
            Scope::Datacenter(datacenter) => {
                self.list_in_container(&datacenter.reference, ObjectKind::Host, &["name"])
                    .await?
            }
            Scope::Cluster { cluster, .. } => {
                return self.reference_list(&cluster.reference, "host").await;
            }
        };
        Ok(objects.into_iter().map(|o| o.obj).collect())
    }

    async fn list_datastores(&self, scope: &Scope) -> Result<Vec<ManagedObjectReference>> {
        match scope {
            Scope::Inventory => {
                let view = self.inventory_view(ObjectKind::Datastore).await?;
                let objects = self
                    .retrieve_from_view(&view, ObjectKind::Datastore, &["name"])
                    .await?;
                Ok(objects.into_iter().map(|o| o.obj).collect())
            }
            // Datastores belong to the datacenter, whatever cluster the scope names
            Scope::Datacenter(datacenter) | Scope::Cluster { datacenter, .. } => {
                self.reference_list(&datacenter.reference, "datastore").await
            }
        }
    }

    async fn retrieve_properties(
        &self,
        kind: ObjectKind,
        refs: &[ManagedObjectReference],
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        self.retrieve(objects_filter(refs, kind, paths)).await
    }

    async fn retrieve_all(&self, kind: ObjectKind, paths: &[&str]) -> Result<Vec<ObjectContent>> {
        let view = self.inventory_view(kind).await?;
        self.retrieve_from_view(&view, kind, paths).await
    }
}

fn property_spec(kind: ObjectKind, paths: &[&str]) -> Value {
    json!({
        "_typeName": "PropertySpec",
        "type": kind.managed_type(),
        "pathSet": paths,
    })
}

/// Filter selecting every object a container view holds
fn view_filter(view: &ManagedObjectReference, kind: ObjectKind, paths: &[&str]) -> Value {
    json!({
        "_typeName": "PropertyFilterSpec",
        "propSet": [property_spec(kind, paths)],
        "objectSet": [{
            "_typeName": "ObjectSpec",
            "obj": view,
            "skip": true,
            "selectSet": [{
                "_typeName": "TraversalSpec",
                "name": "traverseView",
                "type": "ContainerView",
                "path": "view",
                "skip": false,
            }],
        }],
    })
}

/// Filter selecting exactly the given objects
fn objects_filter(refs: &[ManagedObjectReference], kind: ObjectKind, paths: &[&str]) -> Value {
    let object_set: Vec<Value> = refs
        .iter()
        .map(|obj| json!({ "_typeName": "ObjectSpec", "obj": obj, "skip": false }))
        .collect();
    json!({
        "_typeName": "PropertyFilterSpec",
        "propSet": [property_spec(kind, paths)],
        "objectSet": object_set,
    })
}

/// Pair each object with its `name` property, skipping objects without one
fn named(objects: Vec<ObjectContent>) -> impl Iterator<Item = (ManagedObjectReference, String)> {
    objects.into_iter().filter_map(|object| {
        let name = object.property("name")?.as_str()?.to_string();
        Some((object.obj, name))
    })
}
