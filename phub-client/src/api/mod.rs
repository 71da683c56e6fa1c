//! Backend access
//!
//! - `client`: the HTTP gateway (token attachment, timeout, raw responses)
//! - `backend`: typed endpoints on top of the gateway

pub mod backend;
pub mod client;

pub use backend::Backend;
pub use client::{ApiClient, ApiRequest, ApiResponse, REQUEST_TIMEOUT};
