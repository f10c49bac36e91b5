//! Cached HTTP client.
//!
//! Developer-friendly goal: keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;

pub use builder::CachedClientBuilder;
pub use core::CachedClient;
