//! Boundary to the platform TPM broker.
//!
//! [`Broker`] has one method per native entry point. Implementations only
//! forward arguments and report the raw [`NativeStatus`]; interpreting that
//! status is left to [`NativeStatus::check`] so every implementation gets the
//! same classification.

use std::fmt;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const CONTEXT_CREATE: &str = "Tbsi_Context_Create";
pub const GET_DEVICE_INFO: &str = "Tbsi_GetDeviceInfo";
pub const SUBMIT_COMMAND: &str = "Tbsip_Submit_Command";
pub const CONTEXT_CLOSE: &str = "Tbsip_Context_Close";

/// `TBS_CONTEXT_VERSION_TWO`
pub const CONTEXT_VERSION_TWO: u32 = 2;

/// `TBS_COMMAND_LOCALITY_ZERO`, the only locality TBS accepts.
pub const LOCALITY_ZERO: u32 = 0;

/// Bits of `TBS_CONTEXT_PARAMS2::flags`.
pub mod context_flags {
    pub const REQUEST_RAW: u32 = 1 << 0;
    pub const INCLUDE_TPM12: u32 = 1 << 1;
    pub const INCLUDE_TPM20: u32 = 1 << 2;
}

/// Facility words of HRESULTs owned by TBS (`0x8028xxxx`) and the TPM
/// itself (`0x8029xxxx`).
const TBS_FACILITIES: [u32; 2] = [0x8028, 0x8029];

/// `TBS_CONTEXT_PARAMS2`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextParams {
    pub version: u32,
    pub flags: u32,
}

impl ContextParams {
    /// Parameters for raw TPM 2.0 command submission.
    pub const fn tpm20() -> Self {
        Self {
            version: CONTEXT_VERSION_TWO,
            flags: context_flags::INCLUDE_TPM20,
        }
    }
}

/// Opaque broker context (`TBS_HCONTEXT`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextHandle(pub usize);

impl ContextHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Scheduling class of a submitted command (`TBS_COMMAND_PRIORITY_*`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum Priority {
    Low = 100,
    #[default]
    Normal = 200,
    High = 300,
    System = 400,
}

impl Priority {
    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

/// Returns true if `code` lies in the TBS or TPM HRESULT ranges.
pub fn is_tbs_status(code: u32) -> bool {
    TBS_FACILITIES.contains(&(code >> 16))
}

/// A classified broker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Code from the TBS/TPM ranges, passed through unchanged.
    Tbs(u32),
    /// Non-zero return value of the call, reported as a generic HRESULT.
    Platform(u32),
}

impl Status {
    pub fn code(&self) -> u32 {
        match self {
            Status::Tbs(code) | Status::Platform(code) => *code,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Tbs(code) => write!(f, "TBS error 0x{code:08x}"),
            Status::Platform(code) => write!(f, "HRESULT: 0x{code:x}"),
        }
    }
}

/// What a native call left behind: its return value and the thread's last
/// OS error read immediately afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeStatus {
    pub result: u32,
    pub last_error: u32,
}

impl NativeStatus {
    pub const SUCCESS: Self = Self {
        result: 0,
        last_error: 0,
    };

    pub fn from_result(result: u32) -> Self {
        Self {
            result,
            last_error: 0,
        }
    }

    /// Classify the call outcome.
    ///
    /// The last error is only trusted when it falls in the TBS/TPM ranges:
    /// the broker sometimes leaves the response length there, and that
    /// value must not be read as a platform failure. Outside those ranges
    /// the return value decides.
    pub fn check(self, entry_point: &'static str) -> Result<()> {
        if is_tbs_status(self.last_error) {
            return Err(Error::NativeCallFailed {
                entry_point,
                status: Status::Tbs(self.last_error),
            });
        }
        // A TBS-range return value is still reported as `Platform`; only
        // the last error is classified by range.
        if self.result != 0 {
            return Err(Error::NativeCallFailed {
                entry_point,
                status: Status::Platform(self.result),
            });
        }
        Ok(())
    }
}

/// The native entry points of the TPM broker.
pub trait Broker {
    /// `Tbsi_Context_Create`
    fn context_create(
        &mut self,
        params: &ContextParams,
        context: &mut ContextHandle,
    ) -> Result<NativeStatus>;

    /// `Tbsi_GetDeviceInfo`; the buffer length is the size argument.
    fn get_device_info(&mut self, info: &mut [u8]) -> Result<NativeStatus>;

    /// `Tbsip_Submit_Command`. `response_len` holds the usable length of
    /// `response` on entry and the broker-reported length on return.
    fn submit_command(
        &mut self,
        context: ContextHandle,
        locality: u32,
        priority: Priority,
        command: &[u8],
        response: &mut [u8],
        response_len: &mut u32,
    ) -> Result<NativeStatus>;

    /// `Tbsip_Context_Close`
    fn context_close(&mut self, context: ContextHandle) -> Result<NativeStatus>;

    /// Unload the broker library.
    fn release(self) -> Result<()>
    where
        Self: Sized;
}
