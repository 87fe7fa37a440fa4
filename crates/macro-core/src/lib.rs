//! macro-core - Error taxonomy and input-injection surface
//!
//! The recorder and replayer never call an OS API directly. Replay drives an
//! [`InputInjector`]; everything that can go wrong at the engine boundary is
//! an [`Error`] with a closed [`ErrorCode`].
//!
//! ## Backends
//!
//! - [`LogInjector`]: dry run, logs every dispatch
//! - `EnigoInjector`: host injection, requires the `native` feature

pub mod error;
pub mod input;
pub mod platform;

pub use error::{Error, ErrorCode, Result};
pub use input::{InjectError, InjectResult, InputInjector, LogInjector, MouseButton};

#[cfg(feature = "native")]
pub use platform::native::EnigoInjector;

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::input::{InjectError, InputInjector, LogInjector, MouseButton};

    #[cfg(feature = "native")]
    pub use crate::platform::native::EnigoInjector;
}

/// Build the injector for this build: the host backend with `native`,
/// otherwise an error explaining why there is none.
#[cfg(feature = "native")]
pub fn host_injector() -> Result<std::sync::Arc<dyn InputInjector>> {
    let injector = EnigoInjector::new()?;
    Ok(std::sync::Arc::new(injector))
}

#[cfg(not(feature = "native"))]
pub fn host_injector() -> Result<std::sync::Arc<dyn InputInjector>> {
    Err(Error::backend_unavailable(
        "built without a native input-injection backend",
    ))
}
