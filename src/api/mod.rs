//! tmcloud API access: transport, wire types and endpoint wrappers.

pub mod client;
pub mod http_client;
pub mod types;

pub use client::CloudClient;
pub use http_client::{ApiRequest, ApiResponse, Body, Method, ReqwestTransport, Transport};
