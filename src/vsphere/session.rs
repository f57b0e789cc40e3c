//! vCenter Session Management
//!
//! This module owns the HTTP client and the authenticated session used by every API
//! call. A single session is established at startup and shared by all collection
//! tasks; the session id travels in the `vmware-api-session-id` header.
//!
//! Login is single-flight: the session lock is held across the login round trip,
//! so callers arriving without a session wait for one login instead of racing to
//! create their own. Regular API calls only take the lock to copy the session id
//! and then run without it, so partitions of one poll query the vCenter
//! concurrently.

use crate::config::VsphereConfig;
use crate::error::{ExporterError, Result};
use crate::vsphere::types::{ManagedObjectReference, ServiceContent, VimFault};
use crate::vsphere::ObjectKind;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SESSION_HEADER: &str = "vmware-api-session-id";

/// Manages the authenticated vCenter session
pub struct SessionManager {
    config: Arc<VsphereConfig>,
    http: reqwest::Client,
    session: Mutex<Option<ActiveSession>>,
}

/// A logged-in session and the objects bound to it
struct ActiveSession {
    id: String,
    content: ServiceContent,
    /// Inventory-wide container views, created lazily and destroyed with the session
    views: HashMap<ObjectKind, ManagedObjectReference>,
}

/// Copy of the session state a single request needs
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    pub content: ServiceContent,
}

impl SessionManager {
    /// Create a session manager; no request is sent until the first call
    pub fn new(config: Arc<VsphereConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http,
            session: Mutex::new(None),
        })
    }

    /// Base URL of the JSON binding, e.g. `https://vcenter.local/sdk/vim25/8.0.1.0`
    ///
    /// HTTPS unless the configured host explicitly says `http://`.
    pub fn base_url(&self) -> String {
        let host = self.config.host.trim_end_matches('/');
        let (scheme, host) = match host.strip_prefix("http://") {
            Some(plain) => ("http", plain),
            None => ("https", host.trim_start_matches("https://")),
        };
        format!("{}://{}/sdk/vim25/{}", scheme, host, self.config.api_release)
    }

    fn object_url(&self, target: &ManagedObjectReference, member: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url(),
            target.kind,
            target.value,
            member
        )
    }

    /// Return the current session, logging in first if there is none
    ///
    /// Concurrent callers without a session wait on the lock for the login in flight.
    pub async fn ensure_logged_in(&self) -> Result<SessionHandle> {
        let mut guard = self.session.lock().await;

        if guard.is_none() {
            info!("Logging in to vCenter at {}", self.config.host);
            let session = self.login().await?;
            info!("Successfully authenticated to vCenter");
            *guard = Some(session);
        }

        guard
            .as_ref()
            .map(|s| SessionHandle {
                id: s.id.clone(),
                content: s.content.clone(),
            })
            .ok_or_else(|| ExporterError::Auth("No active session".to_string()))
    }

    async fn login(&self) -> Result<ActiveSession> {
        let content_url = format!("{}/ServiceInstance/ServiceInstance/content", self.base_url());
        debug!("Fetching service content from {}", content_url);
        let response = self.http.get(&content_url).send().await?;
        let content: ServiceContent = read_response(response)
            .await?
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| ExporterError::Config("Empty service content".to_string()))?;

        if let Some(about) = &content.about {
            info!(
                "Connected to {} (API {})",
                about.full_name, about.api_version
            );
        }

        let login_url = self.object_url(&content.session_manager, "Login");
        let body = serde_json::json!({
            "userName": self.config.username,
            "password": self.config.password.expose_secret(),
        });
        let response = self.http.post(&login_url).json(&body).send().await?;

        let id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Err(e) = read_response(response).await {
            return Err(match e {
                ExporterError::Vsphere { fault, message } => {
                    ExporterError::Auth(format!("{}: {}", fault, message))
                }
                other => other,
            });
        }

        let id = id.ok_or_else(|| {
            ExporterError::Auth("vCenter did not return a session id".to_string())
        })?;

        Ok(ActiveSession {
            id,
            content,
            views: HashMap::new(),
        })
    }

    /// Invoke a method on a managed object
    ///
    /// Returns `Ok(None)` for methods without a return value.
    pub async fn invoke<T>(
        &self,
        target: &ManagedObjectReference,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let session = self.ensure_logged_in().await?;
        self.invoke_in_session(&session.id, target, method, body).await
    }

    /// Invoke a method within a given session, without logging in
    ///
    /// For objects owned by one session, such as container views: once that
    /// session is gone the call fails instead of opening a new one.
    pub async fn invoke_in_session<T>(
        &self,
        session_id: &str,
        target: &ManagedObjectReference,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        debug!("Invoking {}.{}", target, method);
        let request = self.http.post(self.object_url(target, method)).json(&body);
        self.execute(request, session_id).await
    }

    /// Read one property of a managed object
    pub async fn property<T>(
        &self,
        target: &ManagedObjectReference,
        property: &str,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let session = self.ensure_logged_in().await?;
        debug!("Reading {}.{}", target, property);
        let request = self.http.get(self.object_url(target, property));
        self.execute(request, &session.id).await
    }

    async fn execute<T>(&self, request: RequestBuilder, session_id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match send(request, session_id).await {
            Ok(Some(value)) => Ok(Some(serde_json::from_value(value)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                if e.is_not_authenticated() {
                    warn!("Session expired, will log in again on next request");
                    self.invalidate(session_id).await;
                }
                Err(e)
            }
        }
    }

    /// Drop the session if it is still the one identified by `session_id`
    async fn invalidate(&self, session_id: &str) {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(|s| s.id == session_id) {
            *guard = None;
        }
    }

    /// Inventory-wide view for `kind` cached on the current session
    pub async fn cached_view(
        &self,
        session_id: &str,
        kind: ObjectKind,
    ) -> Option<ManagedObjectReference> {
        let guard = self.session.lock().await;
        guard
            .as_ref()
            .filter(|s| s.id == session_id)
            .and_then(|s| s.views.get(&kind).cloned())
    }

    /// Cache a view unless one is already cached for `kind`
    ///
    /// Returns the view cached by an earlier caller, in which case `view` was not
    /// stored and the caller owns it. Ignored if the session was replaced meanwhile.
    pub async fn remember_view(
        &self,
        session_id: &str,
        kind: ObjectKind,
        view: ManagedObjectReference,
    ) -> Option<ManagedObjectReference> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().filter(|s| s.id == session_id)?;
        match session.views.entry(kind) {
            Entry::Occupied(existing) => Some(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(view);
                None
            }
        }
    }

    /// Log out and forget the session
    pub async fn logout(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            let url = self.object_url(&session.content.session_manager, "Logout");
            let request = self.http.post(url).json(&serde_json::json!({}));
            match self.execute::<serde_json::Value>(request, &session.id).await {
                Ok(_) => info!("Logged out of vCenter"),
                Err(e) => warn!("Logout failed: {}", e),
            }
        }
    }
}

async fn send(request: RequestBuilder, session_id: &str) -> Result<Option<serde_json::Value>> {
    let response = request.header(SESSION_HEADER, session_id).send().await?;
    read_response(response).await
}

/// Turn a response into its JSON body, or a fault error for non-2xx statuses
async fn read_response(response: reqwest::Response) -> Result<Option<serde_json::Value>> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        let body = body.trim();
        if body.is_empty() || body == "null" {
            return Ok(None);
        }
        return Ok(Some(serde_json::from_str(body)?));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ExporterError::Vsphere {
            fault: "NotAuthenticated".to_string(),
            message: format!("HTTP {}", status),
        });
    }

    Err(match serde_json::from_str::<VimFault>(&body) {
        Ok(fault) => ExporterError::Vsphere {
            message: fault.describe(),
            fault: fault.type_name,
        },
        Err(_) => ExporterError::Vsphere {
            fault: format!("HTTP {}", status.as_u16()),
            message: body,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn manager(host: &str) -> SessionManager {
        let config = VsphereConfig {
            host: host.to_string(),
            username: "monitor".to_string(),
            password: SecretString::from("secret"),
            insecure: true,
            api_release: "8.0.1.0".to_string(),
            request_timeout_seconds: 5,
        };
        SessionManager::new(Arc::new(config)).expect("client should build")
    }

    #[test]
    fn base_url_accepts_bare_host() {
        assert_eq!(
            manager("vcenter.local").base_url(),
            "https://vcenter.local/sdk/vim25/8.0.1.0"
        );
    }

    #[test]
    fn base_url_strips_scheme_and_trailing_slash() {
        assert_eq!(
            manager("https://vcenter.local:8443/").base_url(),
            "https://vcenter.local:8443/sdk/vim25/8.0.1.0"
        );
    }

    #[test]
    fn base_url_keeps_explicit_plain_http() {
        assert_eq!(
            manager("http://127.0.0.1:8989").base_url(),
            "http://127.0.0.1:8989/sdk/vim25/8.0.1.0"
        );
    }

    fn logged_in(manager: &SessionManager, id: &str) {
        let content: ServiceContent = serde_json::from_value(serde_json::json!({
            "rootFolder": {"type": "Folder", "value": "group-d1"},
            "propertyCollector": {"type": "PropertyCollector", "value": "propertyCollector"},
            "viewManager": {"type": "ViewManager", "value": "ViewManager"},
            "sessionManager": {"type": "SessionManager", "value": "SessionManager"},
        }))
        .expect("service content");
        *manager.session.try_lock().expect("unlocked") = Some(ActiveSession {
            id: id.to_string(),
            content,
            views: HashMap::new(),
        });
    }

    #[tokio::test]
    async fn remember_view_keeps_the_first_view() {
        let m = manager("vc");
        logged_in(&m, "session-1");
        let first = ManagedObjectReference::new("ContainerView", "view-1");
        let second = ManagedObjectReference::new("ContainerView", "view-2");

        let stored = m.remember_view("session-1", ObjectKind::Host, first.clone()).await;
        let lost = m.remember_view("session-1", ObjectKind::Host, second).await;

        assert_eq!(stored, None);
        assert_eq!(lost, Some(first.clone()));
        assert_eq!(m.cached_view("session-1", ObjectKind::Host).await, Some(first));
    }

    #[tokio::test]
    async fn views_of_a_replaced_session_are_not_cached() {
        let m = manager("vc");
        logged_in(&m, "session-2");
        let view = ManagedObjectReference::new("ContainerView", "view-1");

        let existing = m.remember_view("session-1", ObjectKind::Host, view).await;

        assert_eq!(existing, None);
        assert_eq!(m.cached_view("session-2", ObjectKind::Host).await, None);
    }

    #[test]
    fn object_url_addresses_type_and_id() {
        let m = manager("vc");
        let host = ManagedObjectReference::new("ClusterComputeResource", "domain-c8");
        assert_eq!(
            m.object_url(&host, "host"),
            "https://vc/sdk/vim25/8.0.1.0/ClusterComputeResource/domain-c8/host"
        );
    }
}
