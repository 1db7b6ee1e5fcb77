mod config;

use anyhow::{Context, Result, bail};
use tbs::{NativeBroker, Session, detect_platform};

/// TPM2_PCR_Read of PCRs 0-23 in the SHA-256 bank.
const PCR_READ_COMMAND: [u8; 20] = [
    0x80, 0x01, // TPM_ST_NO_SESSIONS
    0x00, 0x00, 0x00, 0x14, // commandSize = 20
    0x00, 0x00, 0x01, 0x7E, // TPM_CC_PCR_Read
    0x00, 0x00, 0x00, 0x01, // pcrSelectionIn.count
    0x00, 0x0B, // TPM_ALG_SHA256
    0x03, // sizeofSelect
    0xFF, 0xFF, 0xFF,
];

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn run(session: &mut Session<NativeBroker>) -> Result<()> {
    let info = session
        .get_device_info()
        .context("failed to query TPM device info")?;
    println!("{info:?}");
    if !info.is_tpm20() {
        log::warn!("broker reports TPM version {:#x}, not 2.0", info.tpm_version);
    }

    println!("Submitting PCR_Read command...");
    let response = session
        .submit_command(&PCR_READ_COMMAND)
        .context("PCR_Read failed")?;
    println!("PCR_Read response: {}", to_hex(&response));
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let config = config::load()?;
    if !detect_platform(&config.library) {
        bail!(
            "TPM Base Services not available: cannot load {}",
            config.library
        );
    }

    let mut session = Session::open(&config)
        .with_context(|| format!("failed to open TBS context via {}", config.library))?;

    // Only surface the close error if nothing failed before it.
    let result = run(&mut session);
    let closed = session.close().context("failed to close TBS context");
    result.and(closed)
}
