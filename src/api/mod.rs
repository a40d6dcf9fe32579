//! API module
//!
//! HTTP command ingress and audit queries. The API returns as soon as an
//! order is durably accepted; execution is asynchronous.

pub mod routes;

pub use routes::create_router;
