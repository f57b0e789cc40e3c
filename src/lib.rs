//! vSphere Prometheus Exporter
//!
//! A Prometheus exporter for VMware vSphere hosts and datastores.
//!
//! # Overview
//!
//! On every scrape the exporter walks the vCenter inventory (datacenters, clusters,
//! hosts, datastores), retrieves object summaries in bulk and turns them into gauges.
//! The exporter is strictly read-only and keeps no metric values between scrapes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   vSphere JSON API   ┌──────────────────┐
//! │   vCenter   │ ◄──────────────────► │     Exporter     │
//! └─────────────┘   /sdk/vim25/...     │                  │
//!                                      │  ┌────────────┐  │      HTTP      ┌────────────┐
//!                                      │  │ Collector  │  │ ◄────────────► │ Prometheus │
//!                                      │  └─────┬──────┘  │    /metrics    └────────────┘
//!                                      │  ┌─────▼──────┐  │
//!                                      │  │   Walker   │  │
//!                                      │  └─────┬──────┘  │
//!                                      │  ┌─────▼──────┐  │
//!                                      │  │  Fetcher   │  │
//!                                      │  └────────────┘  │
//!                                      └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`vsphere`] - Inventory trait, JSON API client and type definitions
//! - [`fetcher`] - Bulk property retrieval with per-call deadlines
//! - [`walker`] - Datacenter/cluster traversal strategies
//! - [`metrics`] - Metric definition registry and samples
//! - [`collectors`] - Per-poll fan-out and aggregation
//! - [`exposition`] - Prometheus text rendering
//! - [`server`] - HTTP server
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use vsphere_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```

pub mod collectors;
pub mod config;
pub mod error;
pub mod exposition;
pub mod fetcher;
pub mod metrics;
pub mod server;
pub mod vsphere;
pub mod walker;
