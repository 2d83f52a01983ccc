//! HTTP-backed adapters for coordination state shared across a fleet of
//! coordination-core instances.

pub mod rate_limit_backend;

pub use rate_limit_backend::HttpRateLimitBackend;
