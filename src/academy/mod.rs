//! Client for the academy dashboard backend.
//!
//! Every resource family (users, batches, fees, ...) is read through the local
//! cache and written straight to the backend. See [`AcademyClient`].

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod resource;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{AcademyQueryKey, Resource, ResourceSpec};
pub use cached_client::AcademyClient;
pub use client::{HttpTransport, Transport};
pub use error::ApiError;
pub use resource::{Record, ResourceClient};
