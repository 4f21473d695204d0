//! Ranger DNS - SRV answers for services registered in a Ranger registry.
//!
//! This crate provides a request-handling stage for a DNS server. It keeps a
//! cache of every service registered in Ranger, refreshed in the background,
//! and answers queries for `serviceName.namespace.` with one SRV record per
//! registered node. Queries it cannot answer go to the next stage of the chain.
//!
//! ## Features
//!
//! - Periodic bulk pull from Ranger with atomic snapshot swap
//! - Stale-but-available: failed refreshes keep serving the last good snapshot
//! - SRV records in Answer for SRV queries, in Additional for anything else
//! - Merging with the next handler's reply when one exists
//! - Optional per-query lookup mode with no cache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          ranger-dns                             │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │  Ranger Client   │───▶│  Service Cache   │                  │
//! │  │  (HTTP, 5s cap)  │    │  (Arc snapshot)  │                  │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │         ▲                         │ lookup                      │
//! │         │ every 10s               ▼                             │
//! │  ┌──────┴───────────┐    ┌──────────────────┐                  │
//! │  │  Refresh Task    │    │  RangerHandler   │◀── query          │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │                                   │ no match / merge            │
//! │                                   ▼                             │
//! │                          ┌──────────────────┐                  │
//! │                          │  next handler    │                  │
//! │                          └──────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! api.payments. SRV
//!   → lookup "api.payments." in the current snapshot
//!   → one SRV per node: priority 1, weight 1, TTL 30, target "<host>."
//! api.payments. A
//!   → same SRV records, placed in the Additional section
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use ranger_dns::{RangerClient, RangerConfig, RangerHandler, ServiceCache};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RangerConfig::new("http://ranger.internal:8080");
//!     let client = RangerClient::new(&config).unwrap();
//!
//!     let shutdown = CancellationToken::new();
//!     let (cache, _refresh) =
//!         ServiceCache::start(Arc::new(client), config.refresh_interval(), shutdown.clone()).await;
//!
//!     let handler = RangerHandler::new(Arc::new(cache));
//!     // plug `handler` into a chain, or serve it with `DnsServer`
//! }
//! ```

#![warn(missing_docs)]

pub mod answer;
pub mod client;
pub mod combine;
pub mod config;
pub mod error;
pub mod handler;
pub mod lookup;
pub mod metrics;
pub mod plugin;
pub mod refresh;
pub mod registry;
pub mod server;
pub mod state;
pub mod telemetry;

// Re-export main types
pub use client::{RangerClient, RegistrySource};
pub use config::{Config, DnsConfig, FetchMode, RangerConfig, TelemetryConfig};
pub use error::DnsError;
pub use handler::{HandlerState, RangerHandler};
pub use lookup::{DirectLookup, ServiceLookup};
pub use plugin::{Handler, RequestContext, ResponseWriter};
pub use server::{ChainRequestHandler, DnsServer};
pub use state::ServiceCache;
