/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! Request submission engine
//!
//! One call to [`Tpm::submit`] is one complete write-then-read exchange with
//! the device. The TPM cannot interleave commands, so `submit` takes
//! `&mut self`; callers sharing a device across threads must hold a lock
//! around each exchange. Nothing here retries.

use std::fs::File;
use std::io::{Read, Write};

use tracing::Span;

use crate::device::{self, DeviceConfig};
use crate::error::{Result, ReturnCode, TpmError};
use crate::tpm_structure::{deserialize, Field, FieldMut};
use crate::tpm_types::{tpm_tag, CommandHeader, ResponseHeader, MAX_TPM_RESPONSE};

/// A TPM reachable through a byte-oriented read/write handle
pub struct Tpm<D> {
    device: D,
    max_response_size: usize,
    span: Option<Span>,
}

impl Tpm<File> {
    /// Open the device named by `config`
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        Ok(Self::with_config(device::open(config)?, config))
    }
}

impl<D: Read + Write> Tpm<D> {
    pub fn new(device: D) -> Self {
        Tpm {
            device,
            max_response_size: MAX_TPM_RESPONSE,
            span: None,
        }
    }

    pub fn with_config(device: D, config: &DeviceConfig) -> Self {
        Tpm {
            device,
            max_response_size: config.max_response_size,
            span: None,
        }
    }

    /// Scope every event emitted by this handle's exchanges to `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    /// Send one command and decode its response into `output`.
    ///
    /// On a non-zero return code the outputs are left untouched and the code
    /// comes back as [`TpmError::Tpm`]. A response tag other than
    /// `tag + 3` is reported as [`TpmError::IncorrectTag`].
    pub fn submit(&mut self, tag: u16, ordinal: u32, input: &[Field], output: &mut [FieldMut]) -> Result<u32> {
        let span = self.span.clone().unwrap_or_else(Span::none);
        let _entered = span.enter();

        let request = CommandHeader::pack(tag, ordinal, input)?;
        tracing::trace!("TPM request: {}", hex::encode(&request));

        let written = self.device.write(&request)?;
        if written != request.len() {
            return Err(TpmError::ShortWrite {
                written,
                expected: request.len(),
            });
        }

        let mut response = vec![0u8; self.max_response_size];
        let read = self.device.read(&mut response)?;
        response.truncate(read);
        tracing::trace!("TPM response: {}", hex::encode(&response));

        let header = ResponseHeader::unpack(&response)?;

        // Failure responses carry only the header.
        if header.return_code != 0 {
            let rc = ReturnCode(header.return_code);
            tracing::debug!("TPM ordinal 0x{:X} failed: {}", ordinal, rc);
            return Err(TpmError::Tpm(rc));
        }

        let expected_tag = tag.wrapping_add(tpm_tag::RESPONSE_OFFSET);
        if header.tag != expected_tag {
            tracing::warn!(
                "inconsistent tag returned by TPM: expected 0x{:X}, got 0x{:X}",
                expected_tag,
                header.tag
            );
            return Err(TpmError::IncorrectTag(expected_tag, header.tag));
        }

        let size = header.size as usize;
        if size < ResponseHeader::SIZE {
            return Err(TpmError::IncorrectSize(header.size));
        }
        if size > response.len() {
            return Err(TpmError::BufferUnderflow {
                needed: size,
                remaining: response.len(),
            });
        }
        if size > ResponseHeader::SIZE {
            deserialize(&response[ResponseHeader::SIZE..size], output)?;
        }

        Ok(header.return_code)
    }
}
