//! told-core: Shared infrastructure for the told services.
pub mod error;
pub mod middleware;
pub mod observability;
