//! Device position sources.

use async_trait::async_trait;
use thiserror::Error;

use crate::upstream::Coordinates;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LocateError {
  #[error("no position source available")]
  Unsupported,
}

/// Where the device thinks it is.
#[async_trait]
pub trait Locator: Send + Sync {
  async fn locate(&self) -> Result<Coordinates, LocateError>;
}

/// A position given up front (config file or command line).
pub struct FixedLocator(pub Coordinates);

#[async_trait]
impl Locator for FixedLocator {
  async fn locate(&self) -> Result<Coordinates, LocateError> {
    Ok(self.0)
  }
}

/// No positioning at all; forces the IP lookup.
pub struct NoLocator;

#[async_trait]
impl Locator for NoLocator {
  async fn locate(&self) -> Result<Coordinates, LocateError> {
    Err(LocateError::Unsupported)
  }
}
