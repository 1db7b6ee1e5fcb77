//! `TPM_DEVICE_INFO` as returned by `Tbsi_GetDeviceInfo`.

use crate::error::{Error, Result};

/// Size of the encoded record: four little-endian `u32` fields.
pub const DEVICE_INFO_SIZE: usize = 16;

/// `TPM_VERSION_20`
pub const TPM_VERSION_20: u32 = 2;

/// Information about the TPM behind the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub struct_version: u32,
    pub tpm_version: u32,
    pub tpm_interface_type: u32,
    pub tpm_imp_revision: u32,
}

/// How the TPM is attached to the platform (`TPM_IFTYPE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmInterfaceType {
    Unknown,
    Tis,
    TrustZone,
    Hardware,
    Emulator,
    Spb,
    Other(u32),
}

impl From<u32> for TpmInterfaceType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Tis,
            2 => Self::TrustZone,
            3 => Self::Hardware,
            4 => Self::Emulator,
            5 => Self::Spb,
            other => Self::Other(other),
        }
    }
}

impl DeviceInfo {
    /// Decode the record from broker output.
    ///
    /// Fields are read in declaration order, each as a little-endian `u32`.
    /// Bytes beyond the first 16 are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let Some(raw) = buf.get(..DEVICE_INFO_SIZE) else {
            return Err(Error::DecodeFailed {
                expected: DEVICE_INFO_SIZE,
                actual: buf.len(),
            });
        };

        let field = |index: usize| {
            let at = index * 4;
            u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
        };

        Ok(Self {
            struct_version: field(0),
            tpm_version: field(1),
            tpm_interface_type: field(2),
            tpm_imp_revision: field(3),
        })
    }

    pub fn is_tpm20(&self) -> bool {
        self.tpm_version == TPM_VERSION_20
    }

    pub fn interface_type(&self) -> TpmInterfaceType {
        self.tpm_interface_type.into()
    }
}
