//! HTTP client for the video-processing backend.
//!
//! This crate provides:
//! - [`JobBackend`], the seam the orchestrator drives
//! - [`BackendClient`], its reqwest implementation
//! - Request metrics by endpoint and status

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;


pub use backend::JobBackend;
pub use client::{endpoints, form_fields, BackendClient};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
