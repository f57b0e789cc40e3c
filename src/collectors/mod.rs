//! Collection Orchestrator
//!
//! Runs one poll of the vCenter: lists datacenters, fans out one task per
//! partition, joins them and merges their samples with the availability sample.
//!
//! # Architecture
//!
//! Partition collectors follow a consistent pattern:
//! - Accept a [`PartitionContext`] (walker, registry, sample sender) and a [`Scope`]
//! - Fetch the partition's snapshots through the walker
//! - Emit one sample per snapshot and per definition, in registry order
//! - Return a [`CollectionStatus`]
//!
//! # Poll Lifecycle
//!
//! ```text
//! Idle → ListingDatacenters ─┬─ error ──────────────────────────→ Failed
//!                            └─ ok → FanningOut → Aggregating → Done | Degraded
//! ```
//!
//! # Error Handling
//!
//! A failing partition logs a warning and emits nothing; siblings keep running.
//! Availability is the worst status returned by any partition, so any failure
//! anywhere reports the vCenter as unavailable for that poll. Nothing is retried.

use crate::config::MetricsConfig;
use crate::fetcher::PropertyFetcher;
use crate::metrics::{MetricRegistry, Sample};
use crate::vsphere::types::Datacenter;
use crate::vsphere::{Inventory, Scope};
use crate::walker::{HierarchyWalker, WalkStrategy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

pub mod datastore;
pub mod host;

pub use datastore::collect_datastore_partition;
pub use host::{collect_datacenter_hosts, collect_host_partition};

/// Status of one partition's collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// Snapshots were fetched and their samples emitted
    Success,
    /// Collection failed but is non-fatal (already logged as warning)
    Failed,
}

impl CollectionStatus {
    /// Fold two statuses; any failure wins
    pub fn worst(self, other: CollectionStatus) -> CollectionStatus {
        match (self, other) {
            (CollectionStatus::Success, CollectionStatus::Success) => CollectionStatus::Success,
            _ => CollectionStatus::Failed,
        }
    }
}

/// Whether the vCenter answered every request of a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

impl From<CollectionStatus> for Availability {
    fn from(status: CollectionStatus) -> Self {
        match status {
            CollectionStatus::Success => Availability::Available,
            CollectionStatus::Failed => Availability::Unavailable,
        }
    }
}

/// Terminal state of a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Every partition reported
    Done,
    /// Datacenters were listed but at least one partition failed or timed out
    Degraded,
    /// Datacenters could not be listed; only the availability sample was emitted
    Failed,
}

/// Everything one poll produced
#[derive(Debug, Clone)]
pub struct PollReport {
    pub status: PollStatus,
    pub availability: Availability,
    /// Object samples in arrival order, then the availability sample
    pub samples: Vec<Sample>,
}

impl PollReport {
    /// Samples emitted for inventory objects, without the availability sample
    pub fn object_samples(&self) -> &[Sample] {
        let end = self.samples.len().saturating_sub(1);
        &self.samples[..end]
    }
}

/// Timeouts and feature switches for the orchestrator
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Deadline for each individual vCenter call
    pub call_timeout: Duration,
    /// Deadline for the whole poll, listing included
    pub poll_timeout: Duration,
    pub collect_hosts: bool,
    pub collect_datastores: bool,
}

impl From<&MetricsConfig> for CollectorSettings {
    fn from(config: &MetricsConfig) -> Self {
        Self {
            call_timeout: Duration::from_secs(config.call_timeout_seconds),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds),
            collect_hosts: config.collect_host_metrics,
            collect_datastores: config.collect_datastore_metrics,
        }
    }
}

/// Shared state handed to every partition task
///
/// Cheap to clone: the walker and registry are reference counted and the sender
/// is a handle on the poll's sample channel.
#[derive(Clone)]
pub struct PartitionContext {
    pub walker: HierarchyWalker,
    pub registry: Arc<MetricRegistry>,
    samples: mpsc::UnboundedSender<Sample>,
}

impl PartitionContext {
    pub fn new(
        walker: HierarchyWalker,
        registry: Arc<MetricRegistry>,
        samples: mpsc::UnboundedSender<Sample>,
    ) -> Self {
        Self {
            walker,
            registry,
            samples,
        }
    }

    pub fn emit(&self, sample: Sample) {
        // The receiver outlives every task of the poll
        let _ = self.samples.send(sample);
    }
}

/// Helper to reduce boilerplate in partition collectors
///
/// Wraps a fetch with consistent error handling:
/// - On success: processes data, logs, returns `CollectionStatus::Success`
/// - On error: logs warning, returns `CollectionStatus::Failed` (non-fatal)
///
/// # Arguments
///
/// * `name` - What is being collected (for logging)
/// * `query_future` - Fetch returning the snapshots
/// * `process` - Function turning the snapshots into samples
pub async fn collect_with_handler<T, F, P, E>(
    name: &str,
    query_future: F,
    process: P,
) -> CollectionStatus
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: FnOnce(T),
{
    match query_future.await {
        Ok(data) => {
            process(data);
            debug!("Collected {}", name);
            CollectionStatus::Success
        }
        Err(e) => {
            warn!("Failed to collect {}: {}", name, e);
            CollectionStatus::Failed
        }
    }
}

/// Wait for every task in the set and fold their statuses
pub async fn join_partitions(tasks: &mut JoinSet<CollectionStatus>) -> CollectionStatus {
    let mut outcome = CollectionStatus::Success;
    while let Some(joined) = tasks.join_next().await {
        let status = joined.unwrap_or_else(|e| {
            error!("Collection task panicked: {}", e);
            CollectionStatus::Failed
        });
        outcome = outcome.worst(status);
    }
    outcome
}

/// Runs polls against one vCenter
pub struct Collector {
    walker: HierarchyWalker,
    registry: Arc<MetricRegistry>,
    settings: CollectorSettings,
}

impl Collector {
    /// The walk strategy is taken from the registry so labels always match partitions
    pub fn new(
        inventory: Arc<dyn Inventory>,
        registry: MetricRegistry,
        settings: CollectorSettings,
    ) -> Self {
        let fetcher = PropertyFetcher::new(inventory, settings.call_timeout);
        let walker = HierarchyWalker::new(fetcher, registry.strategy());
        Self {
            walker,
            registry: Arc::new(registry),
            settings,
        }
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Run one poll and return its samples, availability sample last
    pub async fn collect(&self) -> PollReport {
        let started = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (status, availability) = self.run(tx, started + self.settings.poll_timeout).await;

        // Every sender is gone once `run` returns, so this drains and stops
        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }
        samples.push(
            self.registry
                .availability_sample(availability == Availability::Available),
        );

        info!(
            "Poll {:?}: {} samples in {:?}",
            status,
            samples.len(),
            started.elapsed()
        );

        PollReport {
            status,
            availability,
            samples,
        }
    }

    async fn run(
        &self,
        samples: mpsc::UnboundedSender<Sample>,
        deadline: Instant,
    ) -> (PollStatus, Availability) {
        let datacenters = match timeout_at(deadline, self.walker.list_datacenters()).await {
            Ok(Ok(datacenters)) => datacenters,
            Ok(Err(e)) => {
                warn!("Could not retrieve datacenter list: {}", e);
                return (PollStatus::Failed, Availability::Unavailable);
            }
            Err(_) => {
                warn!("Poll deadline expired while listing datacenters");
                return (PollStatus::Failed, Availability::Unavailable);
            }
        };

        let ctx = PartitionContext::new(self.walker.clone(), Arc::clone(&self.registry), samples);
        let mut tasks = JoinSet::new();
        self.spawn_partitions(&ctx, &datacenters, &mut tasks);
        drop(ctx);
        debug!(
            "Spawned {} partitions over {} datacenters",
            tasks.len(),
            datacenters.len()
        );

        let availability = match timeout_at(deadline, join_partitions(&mut tasks)).await {
            Ok(outcome) => Availability::from(outcome),
            Err(_) => {
                warn!(
                    "Poll deadline of {:?} expired, aborting {} unfinished partitions",
                    self.settings.poll_timeout,
                    tasks.len()
                );
                tasks.shutdown().await;
                Availability::Unavailable
            }
        };

        let status = match availability {
            Availability::Available => PollStatus::Done,
            Availability::Unavailable => PollStatus::Degraded,
        };
        (status, availability)
    }

    fn spawn_partitions(
        &self,
        ctx: &PartitionContext,
        datacenters: &[Datacenter],
        tasks: &mut JoinSet<CollectionStatus>,
    ) {
        match self.walker.strategy() {
            WalkStrategy::Flat => {
                if self.settings.collect_hosts {
                    tasks.spawn(collect_host_partition(ctx.clone(), Scope::Inventory));
                }
                if self.settings.collect_datastores {
                    tasks.spawn(collect_datastore_partition(ctx.clone(), Scope::Inventory));
                }
            }
            WalkStrategy::Hierarchical => {
                for datacenter in datacenters {
                    if self.settings.collect_hosts {
                        tasks.spawn(collect_datacenter_hosts(ctx.clone(), datacenter.clone()));
                    }
                    if self.settings.collect_datastores {
                        tasks.spawn(collect_datastore_partition(
                            ctx.clone(),
                            Scope::Datacenter(datacenter.clone()),
                        ));
                    }
                }
            }
        }
    }
}
