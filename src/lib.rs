//! Read-through local cache and sync client for the academy dashboard backend.

pub mod academy;
pub mod cache;
pub mod config;
pub mod logging;
