//! Transport seam between the fetch layer and the network.

mod request;
#[cfg(test)]
pub mod testing;
mod transport;

pub use request::{Destination, Request, Response, ResponseSource};
pub use transport::{HttpTransport, Transport};
