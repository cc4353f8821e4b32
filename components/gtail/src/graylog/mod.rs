//! HTTP client and wire types for the Graylog REST API.

pub mod client;
pub mod models;
