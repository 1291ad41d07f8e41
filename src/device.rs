/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! TPM device access
//!
//! The engine talks to anything implementing `Read + Write`. This module only
//! covers locating and opening the Linux character device.

use std::env;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use crate::error::Result;
use crate::tpm_types::MAX_TPM_RESPONSE;

/// Default TPM 1.2 character device
pub const DEFAULT_DEVICE_PATH: &str = "/dev/tpm0";

/// Overrides `DeviceConfig::path`
pub const ENV_DEVICE_PATH: &str = "TPM_DEVICE";

/// Overrides `DeviceConfig::max_response_size`
pub const ENV_MAX_RESPONSE: &str = "TPM_MAX_RESPONSE";

/// Where to find the TPM and how much to read per response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub path: PathBuf,
    pub max_response_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            path: PathBuf::from(DEFAULT_DEVICE_PATH),
            max_response_size: MAX_TPM_RESPONSE,
        }
    }
}

impl DeviceConfig {
    /// Defaults, overridden by `TPM_DEVICE` and `TPM_MAX_RESPONSE`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = DeviceConfig::default();
        if let Some(path) = lookup(ENV_DEVICE_PATH).filter(|p| !p.is_empty()) {
            config.path = PathBuf::from(path);
        }
        if let Some(max) = lookup(ENV_MAX_RESPONSE) {
            match max.parse::<usize>() {
                Ok(max) if max > 0 => config.max_response_size = max,
                _ => tracing::warn!("ignoring invalid {}={:?}", ENV_MAX_RESPONSE, max),
            }
        }
        config
    }
}

/// Open the device read/write. Closing is dropping the returned file.
pub fn open(config: &DeviceConfig) -> Result<File> {
    let file = OpenOptions::new().read(true).write(true).open(&config.path)?;
    tracing::debug!("opened TPM device {}", config.path.display());
    Ok(file)
}
