//! quicklook: weather, air quality and holiday dashboard with an offline-first
//! fetch layer.
//!
//! - [`cache`]: response cache, freshness records and the network-first `FetchCache`
//! - [`worker`]: the offline worker intercepting requests at the transport boundary
//! - [`upstream`]: provider endpoints and payload types
//! - [`dashboard`]: location resolution and fetch orchestration

pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod logging;
pub mod net;
pub mod runtime;
pub mod ui;
pub mod upstream;
pub mod worker;
