//! Remote registry client.

pub mod client;
pub mod retry;

pub use client::HttpRegistry;
pub use retry::RetryPolicy;
