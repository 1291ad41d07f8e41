/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;

use crate::crypto::Crypto;
use crate::error::{Result, TpmError};
use crate::tpm_buffer::TpmBuffer;
use crate::tpm_structure::TpmStructure;
use crate::tpm_types::*;

/// Exponent assumed when a key carries none
const DEFAULT_RSA_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01];

impl PubKey {
    pub fn rsa_params(&self) -> Result<RsaKeyParms> {
        if self.algorithm_params.algorithm_id != TPM_ALG_RSA {
            return Err(TpmError::InvalidKey(format!(
                "algorithm 0x{:X} is not RSA",
                self.algorithm_params.algorithm_id
            )));
        }
        RsaKeyParms::from_bytes(&self.algorithm_params.params)
    }

    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey> {
        let params = self.rsa_params()?;
        let exponent: &[u8] = if params.exponent.is_empty() {
            &DEFAULT_RSA_EXPONENT
        } else {
            &params.exponent
        };
        RsaPublicKey::new(BigUint::from_bytes_be(&self.key), BigUint::from_bytes_be(exponent))
            .map_err(|e| TpmError::InvalidKey(e.to_string()))
    }
}

impl CapVersionInfo {
    /// Split a Quote2 version blob into its fixed prefix and vendor suffix.
    /// An empty blob means the TPM sent no version information.
    pub fn decode(bytes: &[u8]) -> Result<Option<CapVersionInfo>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() < CapVersionFixed::SIZE {
            return Err(TpmError::BufferUnderflow {
                needed: CapVersionFixed::SIZE,
                remaining: bytes.len(),
            });
        }
        let fixed = CapVersionFixed::from_bytes(&bytes[..CapVersionFixed::SIZE])?;
        Ok(Some(CapVersionInfo {
            fixed,
            vendor_specific: bytes[CapVersionFixed::SIZE..].to_vec(),
        }))
    }
}

/// Check a Quote2 signature. `cap_bytes` is the raw version blob returned by
/// the TPM, empty when no version was requested.
pub fn verify_quote2(
    pub_key: &PubKey,
    external_data: &Digest,
    pcr_info: &PcrInfoShort,
    cap_bytes: &[u8],
    sig: &[u8],
) -> Result<bool> {
    let mut quote_info = TpmBuffer::new();
    quote_info.write_u16(tpm_tag::QUOTE_INFO2);
    quote_info.write_bytes(b"QUT2");
    quote_info.write_bytes(external_data);
    pcr_info.serialize(&mut quote_info)?;
    quote_info.write_bytes(cap_bytes);

    let digest = Crypto::sha1(quote_info.as_bytes());
    let key = pub_key.to_rsa_public_key()?;
    Ok(key.verify(Pkcs1v15Sign::new::<Sha1>(), &digest, sig).is_ok())
}
