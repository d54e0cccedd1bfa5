//! Core domain + application logic for the task-management API client.
//!
//! This crate is intentionally transport-agnostic. The HTTP client lives in
//! `hkm-api` and the Telegram file side channel in `hkm-telegram`; both plug
//! into the ports and policies defined here.

pub mod attachment;
pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod response;
pub mod retry;
pub mod validate;

pub use errors::{Error, Result};
