//! Raw TPM 2.0 command submission through the Windows TPM Base Services.
//!
//! A [`Session`] owns one broker context and the library that issued it.
//! Commands and responses are opaque byte buffers; encoding them is the
//! caller's business.
//!
//! ```no_run
//! use tbs::{BrokerConfig, Session};
//!
//! let mut session = Session::open(&BrokerConfig::default())?;
//! let info = session.get_device_info()?;
//! println!("{info:?}");
//! session.close()?;
//! # Ok::<(), tbs::Error>(())
//! ```

pub mod broker;
mod config;
mod device_info;
mod error;
mod session;

#[cfg(feature = "native")]
mod native;

pub use broker::{Broker, ContextHandle, ContextParams, NativeStatus, Priority, Status};
pub use config::{BrokerConfig, DEFAULT_LIBRARY, DEFAULT_MAX_RESPONSE_SIZE};
pub use device_info::{DEVICE_INFO_SIZE, DeviceInfo, TpmInterfaceType};
pub use error::{BoxError, Error, Result};
pub use session::Session;

#[cfg(feature = "native")]
pub use native::{NativeBroker, detect_platform};
