//! Upstream data providers: weather, air quality, geocoding, holidays and IP location.

mod client;
mod endpoints;
pub mod types;

pub use client::UpstreamClient;
pub use endpoints::Endpoints;
pub use types::Coordinates;
