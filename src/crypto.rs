/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! SHA-1 / HMAC-SHA1 primitives used by TPM 1.2 authorization

use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha1::{Digest as Sha1Digest, Sha1};

use crate::error::{Result, TpmError};
use crate::tpm_structure::{serialize, Field};
use crate::tpm_types::{Digest, DIGEST_SIZE};

pub struct Crypto;

impl Crypto {
    pub fn sha1(data: &[u8]) -> Digest {
        let mut out = [0u8; DIGEST_SIZE];
        out.copy_from_slice(&Sha1::digest(data));
        out
    }

    pub fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<Digest> {
        let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
            .map_err(|_| TpmError::InvalidKey("invalid HMAC key".to_string()))?;
        mac.update(data);
        let mut out = [0u8; DIGEST_SIZE];
        out.copy_from_slice(&mac.finalize().into_bytes());
        Ok(out)
    }

    /// Fresh caller nonce
    pub fn random_nonce() -> Digest {
        let mut nonce = [0u8; DIGEST_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// `SHA1(ordinal || params)`. Handles and auth blocks are not part of `params`.
    pub fn in_param_digest(ordinal: u32, params: &[Field]) -> Result<Digest> {
        let mut data = ordinal.to_be_bytes().to_vec();
        data.extend(serialize(params)?);
        Ok(Self::sha1(&data))
    }

    /// `SHA1(returnCode || ordinal || params)`
    pub fn out_param_digest(return_code: u32, ordinal: u32, params: &[Field]) -> Result<Digest> {
        let mut data = return_code.to_be_bytes().to_vec();
        data.extend_from_slice(&ordinal.to_be_bytes());
        data.extend(serialize(params)?);
        Ok(Self::sha1(&data))
    }

    /// `HMAC(key, paramDigest || nonceEven || nonceOdd || continueAuthSession)`
    pub fn auth_digest(
        key: &[u8],
        param_digest: &Digest,
        nonce_even: &Digest,
        nonce_odd: &Digest,
        continue_auth_session: bool,
    ) -> Result<Digest> {
        let mut data = Vec::with_capacity(3 * DIGEST_SIZE + 1);
        data.extend_from_slice(param_digest);
        data.extend_from_slice(nonce_even);
        data.extend_from_slice(nonce_odd);
        data.push(continue_auth_session as u8);
        Self::hmac_sha1(key, &data)
    }
}
