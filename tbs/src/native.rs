//! [`Broker`] backed by the dynamically loaded TBS library.

use std::ffi::c_void;

use libloading::{Library, Symbol};

use crate::broker::{
    Broker, CONTEXT_CLOSE, CONTEXT_CREATE, ContextHandle, ContextParams, GET_DEVICE_INFO,
    NativeStatus, Priority, SUBMIT_COMMAND,
};
use crate::error::{Error, Result};

type ContextCreateFn = unsafe extern "system" fn(*const ContextParams, *mut *mut c_void) -> u32;
type GetDeviceInfoFn = unsafe extern "system" fn(u32, *mut c_void) -> u32;
type SubmitCommandFn =
    unsafe extern "system" fn(*mut c_void, u32, u32, *const u8, u32, *mut u8, *mut u32) -> u32;
type ContextCloseFn = unsafe extern "system" fn(*mut c_void) -> u32;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetLastError(code: u32);
}

/// Check if the broker library can be loaded.
pub fn detect_platform(library: &str) -> bool {
    match NativeBroker::load(library) {
        Ok(broker) => broker.release().is_ok(),
        Err(e) => {
            log::debug!("{e}");
            false
        }
    }
}

#[cfg(windows)]
fn reset_last_error() {
    // SAFETY: SetLastError only writes the calling thread's error slot.
    unsafe { SetLastError(0) }
}

#[cfg(not(windows))]
fn reset_last_error() {}

#[cfg(windows)]
fn last_error() -> u32 {
    std::io::Error::last_os_error()
        .raw_os_error()
        .map(|code| code as u32)
        .unwrap_or(0)
}

/// Only the TBS export itself reports through the last-error slot.
#[cfg(not(windows))]
fn last_error() -> u32 {
    0
}

/// Run one native call, seeing only the last error that call set.
fn invoke(call: impl FnOnce() -> u32) -> NativeStatus {
    reset_last_error();
    let result = call();
    NativeStatus {
        result,
        last_error: last_error(),
    }
}

/// Loaded broker library.
pub struct NativeBroker {
    library: Library,
    name: String,
}

impl NativeBroker {
    /// Load the broker library by name or path.
    pub fn load(name: &str) -> Result<Self> {
        // SAFETY: the TBS library has no initialisation routines with
        // preconditions on the caller.
        let library = unsafe { Library::new(name) }.map_err(|e| Error::BrokerUnavailable {
            library: name.to_string(),
            source: Box::new(e),
        })?;
        log::debug!("loaded broker library {name}");

        Ok(Self {
            library,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry point. Lookups happen per call.
    fn entry_point<T>(&self, name: &'static str) -> Result<Symbol<'_, T>> {
        // SAFETY: every `T` used with this is the documented signature of
        // the named TBS export.
        unsafe { self.library.get::<T>(name.as_bytes()) }.map_err(|e| {
            Error::EntryPointNotFound {
                name,
                source: Box::new(e),
            }
        })
    }
}

impl Broker for NativeBroker {
    fn context_create(
        &mut self,
        params: &ContextParams,
        context: &mut ContextHandle,
    ) -> Result<NativeStatus> {
        let create = self.entry_point::<ContextCreateFn>(CONTEXT_CREATE)?;
        let mut raw: *mut c_void = std::ptr::null_mut();

        // SAFETY: both pointers reference live locals for the whole call.
        let status = invoke(|| unsafe { create(params, &mut raw) });

        *context = ContextHandle(raw as usize);
        Ok(status)
    }

    fn get_device_info(&mut self, info: &mut [u8]) -> Result<NativeStatus> {
        let get_info = self.entry_point::<GetDeviceInfoFn>(GET_DEVICE_INFO)?;
        let size = u32::try_from(info.len())
            .map_err(|_| Error::InvalidArgument("device info buffer too large"))?;

        // SAFETY: the broker writes at most `size` bytes into `info`.
        Ok(invoke(|| unsafe { get_info(size, info.as_mut_ptr().cast()) }))
    }

    fn submit_command(
        &mut self,
        context: ContextHandle,
        locality: u32,
        priority: Priority,
        command: &[u8],
        response: &mut [u8],
        response_len: &mut u32,
    ) -> Result<NativeStatus> {
        if command.is_empty() {
            return Err(Error::InvalidArgument("command buffer is empty"));
        }
        let command_len = u32::try_from(command.len())
            .map_err(|_| Error::InvalidArgument("command buffer too large"))?;
        let capacity = u32::try_from(response.len()).unwrap_or(u32::MAX);
        *response_len = (*response_len).min(capacity);

        let submit = self.entry_point::<SubmitCommandFn>(SUBMIT_COMMAND)?;

        // SAFETY: `command` is non-empty and `command_len` bytes long; the
        // broker writes at most `*response_len` bytes, which is bounded by
        // the length of `response`.
        Ok(invoke(|| unsafe {
            submit(
                context.0 as *mut c_void,
                locality,
                priority.to_u32(),
                command.as_ptr(),
                command_len,
                response.as_mut_ptr(),
                response_len,
            )
        }))
    }

    fn context_close(&mut self, context: ContextHandle) -> Result<NativeStatus> {
        let close = self.entry_point::<ContextCloseFn>(CONTEXT_CLOSE)?;

        // SAFETY: `context` came from `Tbsi_Context_Create` and is closed once.
        Ok(invoke(|| unsafe { close(context.0 as *mut c_void) }))
    }

    fn release(self) -> Result<()> {
        let Self { library, name } = self;
        library.close().map_err(|e| Error::ReleaseFailed {
            library: name.clone(),
            source: Box::new(e),
        })?;
        log::debug!("released broker library {name}");
        Ok(())
    }
}
