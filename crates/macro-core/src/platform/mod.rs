//! Platform injection backends
//!
//! Only compiled in with the `native` feature; everything else in the crate
//! is backend-agnostic.

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native as current;
