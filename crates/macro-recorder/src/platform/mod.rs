//! Platform capture backends
//!
//! Only compiled in with the `native` feature. Without it, input reaches the
//! recorder through any [`InputSource`](crate::capture::InputSource) the
//! embedder provides.

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native as current;
