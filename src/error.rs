/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! Error types for TPM operations

use std::fmt;

use thiserror::Error;

use crate::tpm_helpers::{is_non_fatal, rc_to_str};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TpmError>;

/// TPM Error types
#[derive(Debug, Error)]
pub enum TpmError {
    /// Device write or read failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The device accepted fewer bytes than the command holds
    #[error("short write to TPM: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Buffer underflow occurred during deserialization
    #[error("buffer underflow: needed {needed} bytes, {remaining} remaining")]
    BufferUnderflow { needed: usize, remaining: usize },

    /// Buffer overflow occurred during serialization
    #[error("buffer overflow: {0}")]
    BufferOverflow(String),

    /// A field list combines variable-length policies the codec cannot decode
    #[error("unsupported field layout: {0}")]
    InvalidLayout(String),

    /// The TPM rejected the command
    #[error("TPM error {0}")]
    Tpm(ReturnCode),

    /// Incorrect response tag value
    #[error("incorrect tag: expected 0x{0:X}, got 0x{1:X}")]
    IncorrectTag(u16, u16),

    /// Response header declares a size smaller than the header itself
    #[error("incorrect response size {0}")]
    IncorrectSize(u32),

    /// The session was closed by a previous response
    #[error("authorization session 0x{0:08X} has been terminated")]
    SessionTerminated(u32),

    /// The response HMAC does not match the one computed locally
    #[error("response authorization digest mismatch")]
    ResponseAuthMismatch,

    /// Key material could not be converted
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl TpmError {
    /// The device-reported return code, if this is a protocol error
    pub fn return_code(&self) -> Option<ReturnCode> {
        match self {
            Self::Tpm(rc) => Some(*rc),
            _ => None,
        }
    }

    /// True for failures of the byte transport itself
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::IoError(_) | Self::ShortWrite { .. })
    }

    /// The device ran out of session or key slots. Flushing unused handles
    /// and repeating the establishment call may succeed.
    pub fn is_resource_exhausted(&self) -> bool {
        self.return_code().is_some_and(|rc| rc.is_resource_exhausted())
    }

    /// The referenced handle is unknown to the device
    pub fn is_resource_not_found(&self) -> bool {
        self.return_code().is_some_and(|rc| rc.is_resource_not_found())
    }
}

/// Numeric TPM 1.2 return code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub u32);

impl ReturnCode {
    pub const SUCCESS: ReturnCode = ReturnCode(0x00);
    pub const AUTHFAIL: ReturnCode = ReturnCode(0x01);
    pub const BADINDEX: ReturnCode = ReturnCode(0x02);
    pub const BAD_PARAMETER: ReturnCode = ReturnCode(0x03);
    pub const BAD_ORDINAL: ReturnCode = ReturnCode(0x0A);
    pub const INVALID_KEYHANDLE: ReturnCode = ReturnCode(0x0C);
    pub const KEYNOTFOUND: ReturnCode = ReturnCode(0x0D);
    pub const NOSPACE: ReturnCode = ReturnCode(0x11);
    pub const RESOURCES: ReturnCode = ReturnCode(0x15);
    pub const AUTH2FAIL: ReturnCode = ReturnCode(0x1D);
    pub const BADTAG: ReturnCode = ReturnCode(0x1E);
    pub const INVALID_AUTHHANDLE: ReturnCode = ReturnCode(0x22);
    pub const INVALID_RESOURCE: ReturnCode = ReturnCode(0x35);

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    pub fn is_resource_exhausted(&self) -> bool {
        *self == Self::RESOURCES || *self == Self::NOSPACE
    }

    pub fn is_resource_not_found(&self) -> bool {
        matches!(
            *self,
            Self::INVALID_AUTHHANDLE | Self::INVALID_KEYHANDLE | Self::KEYNOTFOUND | Self::INVALID_RESOURCE
        )
    }

    /// The TPM was busy; the same command may succeed if sent again later
    pub fn is_non_fatal(&self) -> bool {
        is_non_fatal(self.0)
    }

    /// Human readable description of the code
    pub fn message(&self) -> &'static str {
        rc_to_str(self.0)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_non_fatal() {
            write!(f, "0x{:X} ({}, retry later)", self.0, self.message())
        } else {
            write!(f, "0x{:X} ({})", self.0, self.message())
        }
    }
}
