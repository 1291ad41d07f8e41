/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! TPM 1.2 command engine
//!
//! Encodes commands into the TPM wire format, exchanges them with a device
//! handle, decodes the responses and runs the OIAP / OSAP authorization
//! handshakes that privileged commands need.
//!
//! ```no_run
//! use tss_tpm12::{device::DeviceConfig, tpm::Tpm};
//!
//! let mut tpm = Tpm::open(&DeviceConfig::from_env())?;
//! let pcr0 = tpm.pcr_read(0)?;
//! # Ok::<(), tss_tpm12::error::TpmError>(())
//! ```

pub mod auth_session;
pub mod commands;
pub mod crypto;
pub mod device;
pub mod error;
pub mod pcr;
pub mod tpm;
pub mod tpm_buffer;
pub mod tpm_helpers;
pub mod tpm_structure;
pub mod tpm_type_extensions;
pub mod tpm_types;

#[cfg(test)]
mod test_util;

pub use auth_session::{AuthSession, SessionKind};
pub use commands::Quote2Response;
pub use error::{Result, ReturnCode, TpmError};
pub use tpm::Tpm;
