//! Broker session lifecycle and command submission.

use zeroize::Zeroizing;

use crate::broker::{
    Broker, CONTEXT_CLOSE, CONTEXT_CREATE, ContextHandle, ContextParams, GET_DEVICE_INFO,
    LOCALITY_ZERO, SUBMIT_COMMAND,
};
use crate::config::BrokerConfig;
use crate::device_info::{DEVICE_INFO_SIZE, DeviceInfo};
use crate::error::{Error, Result};

#[cfg(feature = "native")]
use crate::native::NativeBroker;

/// An open TBS context together with the library that issued it.
///
/// Calls block until the broker answers. A session is not meant to be
/// shared between threads without external serialization.
pub struct Session<B: Broker> {
    /// `None` once the session has been closed.
    broker: Option<B>,
    context: ContextHandle,
    config: BrokerConfig,
}

#[cfg(feature = "native")]
impl Session<NativeBroker> {
    /// Load the broker library and create a TPM 2.0 context.
    pub fn open(config: &BrokerConfig) -> Result<Self> {
        config.validate()?;
        let broker = NativeBroker::load(&config.library)?;
        Self::create(broker, config)
    }
}

impl<B: Broker> Session<B> {
    /// Create a TPM 2.0 context through an already loaded broker.
    ///
    /// If the broker refuses the context, it is released before the
    /// creation error is returned.
    pub fn with_broker(broker: B, config: &BrokerConfig) -> Result<Self> {
        config.validate()?;
        Self::create(broker, config)
    }

    /// `config` must already be validated.
    fn create(mut broker: B, config: &BrokerConfig) -> Result<Self> {
        let params = ContextParams::tpm20();
        let mut context = ContextHandle::default();
        let created = broker
            .context_create(&params, &mut context)
            .and_then(|status| status.check(CONTEXT_CREATE));

        if let Err(e) = created {
            if let Err(release) = broker.release() {
                log::debug!("ignoring release failure after {CONTEXT_CREATE} error: {release}");
            }
            return Err(e);
        }

        log::info!("opened TBS context {:#x}", context.0);
        Ok(Self {
            broker: Some(broker),
            context,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Raw value of the broker context handle.
    pub fn device_context(&self) -> ContextHandle {
        self.context
    }

    pub fn is_closed(&self) -> bool {
        self.broker.is_none()
    }

    fn broker(&mut self) -> Result<&mut B> {
        self.broker.as_mut().ok_or(Error::Closed)
    }

    /// Query the broker for information about the TPM.
    pub fn get_device_info(&mut self) -> Result<DeviceInfo> {
        let broker = self.broker()?;
        let mut info = [0u8; DEVICE_INFO_SIZE];
        broker
            .get_device_info(&mut info)?
            .check(GET_DEVICE_INFO)?;

        let info = DeviceInfo::from_bytes(&info)?;
        log::debug!("device info: {info:?}");
        Ok(info)
    }

    /// Submit a raw TPM command and return the raw response.
    ///
    /// The command is executed exactly once; nothing is retried.
    pub fn submit_command(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        if command.is_empty() {
            return Err(Error::InvalidArgument("command buffer is empty"));
        }
        if u32::try_from(command.len()).is_err() {
            return Err(Error::InvalidArgument("command buffer too large"));
        }

        let context = self.context;
        let priority = self.config.priority;
        let capacity = self.config.max_response_size;
        let broker = self.broker()?;

        let mut response = Zeroizing::new(vec![0u8; capacity]);
        // Sessions only exist for validated configs, which bound
        // max_response_size to u32.
        let mut response_len = capacity as u32;

        log::debug!("submitting {} byte command", command.len());
        broker
            .submit_command(
                context,
                LOCALITY_ZERO,
                priority,
                command,
                &mut response,
                &mut response_len,
            )?
            .check(SUBMIT_COMMAND)?;

        let len = response_len as usize;
        if len > capacity {
            return Err(Error::ResponseOverflow {
                reported: len,
                capacity,
            });
        }
        log::debug!("received {len} byte response");
        Ok(response[..len].to_vec())
    }

    /// Close the context and release the broker library.
    ///
    /// The library is released even when closing the context fails; the
    /// first error encountered is returned. Closing twice returns
    /// [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let broker = self.broker.take().ok_or(Error::Closed)?;
        shutdown(broker, self.context)?;
        log::info!("closed TBS context {:#x}", self.context.0);
        Ok(())
    }
}

impl<B: Broker> Drop for Session<B> {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.take() {
            if let Err(e) = shutdown(broker, self.context) {
                log::warn!("failed to close TBS context {:#x}: {e}", self.context.0);
            }
        }
    }
}

fn shutdown<B: Broker>(mut broker: B, context: ContextHandle) -> Result<()> {
    let closed = broker
        .context_close(context)
        .and_then(|status| status.check(CONTEXT_CLOSE));
    let released = broker.release();
    closed.and(released)
}
