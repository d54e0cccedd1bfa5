//! HTTP client for the task-management backend.
//!
//! [`ApiClient`] owns the pooled connection resource and the attachment side
//! channel, runs every call through the retry engine, and exposes the typed
//! domain operations (`verify_user`, `get_user_tasks`, ...) that
//! conversational handlers consume.

pub mod operations;
pub mod request;
pub mod transport;

pub use request::{ApiRequest, FormField, RequestBody};
pub use transport::{ApiClient, ApiClientBuilder, ConnectionPool, TransportError};
