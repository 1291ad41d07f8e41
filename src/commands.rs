/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! TPM 1.2 command handlers
//!
//! Each handler fixes the tag, ordinal and field layout of one command and
//! hands it to [`Tpm::submit`]. Errors come back unchanged; a handler never
//! retries. Authorization blocks are built by the caller, usually with
//! [`AuthSession::authorize`](crate::auth_session::AuthSession::authorize)
//! over the matching `*_params` list below.

use std::io::{Read, Write};

use crate::error::{Result, TpmError};
use crate::tpm::Tpm;
use crate::tpm_structure::{Field, FieldMut};
use crate::tpm_types::*;

/// Decoded TPM_Quote2 output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote2Response {
    pub pcr_info: PcrInfoShort,
    /// `None` when the TPM sent no version information
    pub cap_info: Option<CapVersionInfo>,
    /// Version blob exactly as received, part of the signed data
    pub cap_bytes: Vec<u8>,
    pub sig: Vec<u8>,
    pub response_auth: ResponseAuth,
}

/// Authorized parameters of TPM_Seal
pub fn seal_params<'a>(command: &'a SealCommand, pcr_info: Option<&'a PcrInfoLong>, data: &'a [u8]) -> Vec<Field<'a>> {
    vec![
        Field::Array(&command.enc_auth),
        match pcr_info {
            Some(info) => Field::SizedStruct(info),
            None => Field::U32(0),
        },
        Field::Sized(data),
    ]
}

/// Authorized parameters of TPM_Unseal
pub fn unseal_params(stored: &TpmStoredData) -> Vec<Field<'_>> {
    vec![Field::Struct(stored)]
}

/// Authorized parameters of TPM_LoadKey2
pub fn load_key2_params(key: &Key) -> Vec<Field<'_>> {
    vec![Field::Struct(key)]
}

/// Authorized parameters of TPM_Quote2
pub fn quote2_params<'a>(external_data: &'a Digest, selection: &'a PcrSelection, add_version: bool) -> Vec<Field<'a>> {
    vec![
        Field::Array(external_data),
        Field::Struct(selection),
        Field::Bool(add_version),
    ]
}

/// Output parameters of TPM_Unseal, for checking the response HMAC
pub fn unseal_out_params(secret: &[u8]) -> Result<Vec<Field<'_>>> {
    let size = u32::try_from(secret.len())
        .map_err(|_| TpmError::BufferOverflow(format!("secret of {} bytes", secret.len())))?;
    Ok(vec![Field::U32(size), Field::Array(secret)])
}

/// Output parameters of TPM_Quote2, for checking the response HMAC
pub fn quote2_out_params(quote: &Quote2Response) -> Vec<Field<'_>> {
    vec![
        Field::Struct(&quote.pcr_info),
        Field::Sized(&quote.cap_bytes),
        Field::Sized(&quote.sig),
    ]
}

impl<D: Read + Write> Tpm<D> {
    /// Seal `data` under the storage key in `command.key_handle`, optionally
    /// bound to the PCR state in `pcr_info`.
    pub fn seal(
        &mut self,
        command: &SealCommand,
        pcr_info: Option<&PcrInfoLong>,
        data: &[u8],
        auth: &CommandAuth,
    ) -> Result<(TpmStoredData, ResponseAuth)> {
        let mut input = vec![Field::U32(command.key_handle)];
        input.extend(seal_params(command, pcr_info, data));
        input.push(Field::Struct(auth));

        let mut stored = TpmStoredData::default();
        let mut response_auth = ResponseAuth::default();
        self.submit(
            tpm_tag::RQU_AUTH1_COMMAND,
            tpm_ord::SEAL,
            &input,
            &mut [FieldMut::Struct(&mut stored), FieldMut::Struct(&mut response_auth)],
        )?;
        Ok((stored, response_auth))
    }

    /// Recover the plaintext of `stored`. `key_auth` authorizes the parent key,
    /// `data_auth` the sealed blob.
    pub fn unseal(
        &mut self,
        key_handle: Handle,
        stored: &TpmStoredData,
        key_auth: &CommandAuth,
        data_auth: &CommandAuth,
    ) -> Result<(Vec<u8>, ResponseAuth, ResponseAuth)> {
        let mut size = 0u32;
        let mut secret = Vec::new();
        let mut key_response = ResponseAuth::default();
        let mut data_response = ResponseAuth::default();
        self.submit(
            tpm_tag::RQU_AUTH2_COMMAND,
            tpm_ord::UNSEAL,
            &[
                Field::U32(key_handle),
                Field::Struct(stored),
                Field::Struct(key_auth),
                Field::Struct(data_auth),
            ],
            &mut [
                FieldMut::U32(&mut size),
                FieldMut::Remainder(&mut secret),
                FieldMut::Struct(&mut key_response),
                FieldMut::Struct(&mut data_response),
            ],
        )?;

        if size as usize != secret.len() {
            return Err(TpmError::InvalidLayout(format!(
                "unsealed size {} does not match {} returned bytes",
                size,
                secret.len()
            )));
        }
        Ok((secret, key_response, data_response))
    }

    /// Load a wrapped key under the SRK and return its new handle
    pub fn load_key2(&mut self, key: &Key, auth: &CommandAuth) -> Result<(Handle, ResponseAuth)> {
        let mut handle: Handle = 0;
        let mut response_auth = ResponseAuth::default();
        self.submit(
            tpm_tag::RQU_AUTH1_COMMAND,
            tpm_ord::LOAD_KEY2,
            &[Field::U32(tpm_kh::SRK), Field::Struct(key), Field::Struct(auth)],
            &mut [FieldMut::U32(&mut handle), FieldMut::Struct(&mut response_auth)],
        )?;
        tracing::debug!("loaded key 0x{:08X}", handle);
        Ok((handle, response_auth))
    }

    pub fn get_pub_key(&mut self, key_handle: Handle, auth: &CommandAuth) -> Result<(PubKey, ResponseAuth)> {
        let mut pub_key = PubKey::default();
        let mut response_auth = ResponseAuth::default();
        self.submit(
            tpm_tag::RQU_AUTH1_COMMAND,
            tpm_ord::GET_PUB_KEY,
            &[Field::U32(key_handle), Field::Struct(auth)],
            &mut [FieldMut::Struct(&mut pub_key), FieldMut::Struct(&mut response_auth)],
        )?;
        Ok((pub_key, response_auth))
    }

    /// Sign `external_data` together with the selected PCRs
    pub fn quote2(
        &mut self,
        key_handle: Handle,
        external_data: &Digest,
        selection: &PcrSelection,
        add_version: bool,
        auth: &CommandAuth,
    ) -> Result<Quote2Response> {
        let mut input = vec![Field::U32(key_handle)];
        input.extend(quote2_params(external_data, selection, add_version));
        input.push(Field::Struct(auth));

        let mut pcr_info = PcrInfoShort::default();
        let mut cap_bytes = Vec::new();
        let mut sig = Vec::new();
        let mut response_auth = ResponseAuth::default();
        self.submit(
            tpm_tag::RQU_AUTH1_COMMAND,
            tpm_ord::QUOTE2,
            &input,
            &mut [
                FieldMut::Struct(&mut pcr_info),
                FieldMut::Sized(&mut cap_bytes),
                FieldMut::Sized(&mut sig),
                FieldMut::Struct(&mut response_auth),
            ],
        )?;

        Ok(Quote2Response {
            pcr_info,
            cap_info: CapVersionInfo::decode(&cap_bytes)?,
            cap_bytes,
            sig,
            response_auth,
        })
    }

    /// Release a key or session slot on the device
    pub fn flush_specific(&mut self, handle: Handle, resource_type: u32) -> Result<()> {
        self.submit(
            tpm_tag::RQU_COMMAND,
            tpm_ord::FLUSH_SPECIFIC,
            &[Field::U32(handle), Field::U32(resource_type)],
            &mut [],
        )?;
        tracing::debug!("flushed handle 0x{:08X} (resource type {})", handle, resource_type);
        Ok(())
    }

    pub fn pcr_read(&mut self, index: u32) -> Result<Digest> {
        let mut value: Digest = [0; DIGEST_SIZE];
        self.submit(
            tpm_tag::RQU_COMMAND,
            tpm_ord::PCR_READ,
            &[Field::U32(index)],
            &mut [FieldMut::Array(&mut value)],
        )?;
        Ok(value)
    }
}
