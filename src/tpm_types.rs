/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! TPM 1.2 constants and wire structures

use derivative::Derivative;

use crate::error::{Result, TpmError};
use crate::tpm_buffer::TpmBuffer;
use crate::tpm_structure::{serialize_into, Field, TpmStructure};

/// Opaque reference to a TPM-resident key or session
pub type Handle = u32;

/// SHA-1 digest or nonce
pub type Digest = [u8; DIGEST_SIZE];

pub const DIGEST_SIZE: usize = 20;

/// Request tag families. The matching response tag is always 3 higher.
pub mod tpm_tag {
    pub const RQU_COMMAND: u16 = 0x00C1;
    pub const RQU_AUTH1_COMMAND: u16 = 0x00C2;
    pub const RQU_AUTH2_COMMAND: u16 = 0x00C3;
    pub const RSP_COMMAND: u16 = 0x00C4;
    pub const RSP_AUTH1_COMMAND: u16 = 0x00C5;
    pub const RSP_AUTH2_COMMAND: u16 = 0x00C6;

    /// Distance between a request tag and its response tag
    pub const RESPONSE_OFFSET: u16 = 3;

    pub const PCR_INFO_LONG: u16 = 0x0006;
    pub const CAP_VERSION_INFO: u16 = 0x0030;
    pub const QUOTE_INFO2: u16 = 0x0036;

    /// Number of authorization blocks a request tag carries
    pub fn auth_count(tag: u16) -> usize {
        match tag {
            RQU_AUTH1_COMMAND | RSP_AUTH1_COMMAND => 1,
            RQU_AUTH2_COMMAND | RSP_AUTH2_COMMAND => 2,
            _ => 0,
        }
    }
}

/// Command ordinals
pub mod tpm_ord {
    pub const OIAP: u32 = 0x0000000A;
    pub const OSAP: u32 = 0x0000000B;
    pub const PCR_READ: u32 = 0x00000015;
    pub const SEAL: u32 = 0x00000017;
    pub const UNSEAL: u32 = 0x00000018;
    pub const GET_PUB_KEY: u32 = 0x00000021;
    pub const QUOTE2: u32 = 0x0000003E;
    pub const LOAD_KEY2: u32 = 0x00000041;
    pub const FLUSH_SPECIFIC: u32 = 0x000000BA;
}

/// Entity types accepted by OSAP
pub mod tpm_et {
    pub const KEYHANDLE: u16 = 0x0001;
    pub const OWNER: u16 = 0x0002;
    pub const DATA: u16 = 0x0003;
    pub const SRK: u16 = 0x0004;
    pub const KEY: u16 = 0x0005;
}

/// Resource types accepted by FlushSpecific
pub mod tpm_rt {
    pub const KEY: u32 = 0x00000001;
    pub const AUTH: u32 = 0x00000002;
    pub const HASH: u32 = 0x00000003;
    pub const TRANS: u32 = 0x00000004;
    pub const CONTEXT: u32 = 0x00000005;
    pub const COUNTER: u32 = 0x00000006;
    pub const DELEGATE: u32 = 0x00000007;
}

/// Well-known key handles
pub mod tpm_kh {
    use super::Handle;

    pub const SRK: Handle = 0x40000000;
    pub const OWNER: Handle = 0x40000001;
}

pub const TPM_ALG_RSA: u32 = 0x00000001;

/// Version carried by a TPM_STORED_DATA structure
pub const STORED_DATA_VERSION: u32 = 0x01010000;

/// Upper bound for a single response read
pub const MAX_TPM_RESPONSE: usize = 4096;

fn read_digest(buffer: &mut TpmBuffer, digest: &mut Digest) -> Result<()> {
    buffer.read_into(digest)
}

/// `[tag][size][ordinal]` prefix of every request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub tag: u16,
    pub size: u32,
    pub ordinal: u32,
}

impl CommandHeader {
    pub const SIZE: usize = 10;

    /// Frame a request: header with a size placeholder, the payload, then the
    /// size back-patched to the full length.
    pub fn pack(tag: u16, ordinal: u32, payload: &[Field]) -> Result<Vec<u8>> {
        let header = CommandHeader { tag, size: 0, ordinal };
        let mut buffer = TpmBuffer::new();
        header.serialize(&mut buffer)?;
        serialize_into(&mut buffer, payload)?;

        let size = u32::try_from(buffer.len())
            .map_err(|_| TpmError::BufferOverflow(format!("command of {} bytes", buffer.len())))?;
        buffer.patch_u32(2, size)?;
        Ok(buffer.into_bytes())
    }
}

impl TpmStructure for CommandHeader {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u16(self.tag);
        buffer.write_u32(self.size);
        buffer.write_u32(self.ordinal);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.tag = buffer.read_u16()?;
        self.size = buffer.read_u32()?;
        self.ordinal = buffer.read_u32()?;
        Ok(())
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(Self::SIZE)
    }
}

/// `[tag][size][returnCode]` prefix of every response
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub tag: u16,
    pub size: u32,
    pub return_code: u32,
}

impl ResponseHeader {
    pub const SIZE: usize = 10;

    /// Decode only the fixed header at the start of `bytes`
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(TpmError::BufferUnderflow {
                needed: Self::SIZE,
                remaining: bytes.len(),
            });
        }
        Self::from_bytes(&bytes[..Self::SIZE])
    }
}

impl TpmStructure for ResponseHeader {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u16(self.tag);
        buffer.write_u32(self.size);
        buffer.write_u32(self.return_code);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.tag = buffer.read_u16()?;
        self.size = buffer.read_u32()?;
        self.return_code = buffer.read_u32()?;
        Ok(())
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(Self::SIZE)
    }
}

/// Authorization block appended to a request
#[derive(Derivative, Default, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct CommandAuth {
    pub auth_handle: Handle,
    pub nonce_odd: Digest,
    pub continue_auth_session: bool,
    #[derivative(Debug = "ignore")]
    pub auth: Digest,
}

impl CommandAuth {
    pub const SIZE: usize = 4 + DIGEST_SIZE + 1 + DIGEST_SIZE;
}

impl TpmStructure for CommandAuth {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.auth_handle);
        buffer.write_bytes(&self.nonce_odd);
        buffer.write_u8(self.continue_auth_session as u8);
        buffer.write_bytes(&self.auth);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.auth_handle = buffer.read_u32()?;
        read_digest(buffer, &mut self.nonce_odd)?;
        self.continue_auth_session = buffer.read_u8()? != 0;
        read_digest(buffer, &mut self.auth)
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(Self::SIZE)
    }
}

/// Authorization block appended to a response
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResponseAuth {
    pub nonce_even: Digest,
    pub continue_auth_session: bool,
    pub auth: Digest,
}

impl ResponseAuth {
    pub const SIZE: usize = DIGEST_SIZE + 1 + DIGEST_SIZE;
}

impl TpmStructure for ResponseAuth {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_bytes(&self.nonce_even);
        buffer.write_u8(self.continue_auth_session as u8);
        buffer.write_bytes(&self.auth);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        read_digest(buffer, &mut self.nonce_even)?;
        self.continue_auth_session = buffer.read_u8()? != 0;
        read_digest(buffer, &mut self.auth)
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(Self::SIZE)
    }
}

/// OIAP response body
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OiapResponse {
    pub auth_handle: Handle,
    pub nonce_even: Digest,
}

impl TpmStructure for OiapResponse {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.auth_handle);
        buffer.write_bytes(&self.nonce_even);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.auth_handle = buffer.read_u32()?;
        read_digest(buffer, &mut self.nonce_even)
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(4 + DIGEST_SIZE)
    }
}

/// OSAP request body
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OsapCommand {
    pub entity_type: u16,
    pub entity_value: u32,
    pub nonce_odd_osap: Digest,
}

impl TpmStructure for OsapCommand {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u16(self.entity_type);
        buffer.write_u32(self.entity_value);
        buffer.write_bytes(&self.nonce_odd_osap);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.entity_type = buffer.read_u16()?;
        self.entity_value = buffer.read_u32()?;
        read_digest(buffer, &mut self.nonce_odd_osap)
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(2 + 4 + DIGEST_SIZE)
    }
}

/// OSAP response body
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OsapResponse {
    pub auth_handle: Handle,
    pub nonce_even: Digest,
    pub nonce_even_osap: Digest,
}

impl TpmStructure for OsapResponse {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.auth_handle);
        buffer.write_bytes(&self.nonce_even);
        buffer.write_bytes(&self.nonce_even_osap);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.auth_handle = buffer.read_u32()?;
        read_digest(buffer, &mut self.nonce_even)?;
        read_digest(buffer, &mut self.nonce_even_osap)
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(4 + 2 * DIGEST_SIZE)
    }
}

/// Fixed leading parameters of TPM_Seal
#[derive(Derivative, Default, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct SealCommand {
    pub key_handle: Handle,
    #[derivative(Debug = "ignore")]
    pub enc_auth: Digest,
}

impl TpmStructure for SealCommand {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.key_handle);
        buffer.write_bytes(&self.enc_auth);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.key_handle = buffer.read_u32()?;
        read_digest(buffer, &mut self.enc_auth)
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(4 + DIGEST_SIZE)
    }
}

/// Sealed blob produced by TPM_Seal and consumed by TPM_Unseal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmStoredData {
    pub version: u32,
    pub seal_info: Vec<u8>,
    pub enc_data: Vec<u8>,
}

impl Default for TpmStoredData {
    fn default() -> Self {
        TpmStoredData {
            version: STORED_DATA_VERSION,
            seal_info: Vec::new(),
            enc_data: Vec::new(),
        }
    }
}

impl TpmStructure for TpmStoredData {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.version);
        buffer.write_sized(&self.seal_info)?;
        buffer.write_sized(&self.enc_data)
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.version = buffer.read_u32()?;
        self.seal_info = buffer.read_sized()?;
        self.enc_data = buffer.read_sized()?;
        Ok(())
    }
}

/// Bitmask of selected PCR slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrSelection {
    pub mask: Vec<u8>,
}

impl Default for PcrSelection {
    fn default() -> Self {
        PcrSelection { mask: vec![0; PcrSelection::DEFAULT_SIZE] }
    }
}

impl PcrSelection {
    /// Mask bytes for a TPM with 24 PCRs
    pub const DEFAULT_SIZE: usize = 3;
}

impl TpmStructure for PcrSelection {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        let size = u16::try_from(self.mask.len())
            .map_err(|_| TpmError::BufferOverflow(format!("PCR mask of {} bytes", self.mask.len())))?;
        buffer.write_u16(size);
        buffer.write_bytes(&self.mask);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        let size = buffer.read_u16()? as usize;
        self.mask = buffer.read_bytes(size)?;
        Ok(())
    }
}

/// TPM_PCR_INFO_LONG, the PCR binding of a sealed blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrInfoLong {
    pub tag: u16,
    pub locality_at_creation: u8,
    pub locality_at_release: u8,
    pub creation_pcr_selection: PcrSelection,
    pub release_pcr_selection: PcrSelection,
    pub digest_at_creation: Digest,
    pub digest_at_release: Digest,
}

impl Default for PcrInfoLong {
    fn default() -> Self {
        PcrInfoLong {
            tag: tpm_tag::PCR_INFO_LONG,
            locality_at_creation: 0,
            locality_at_release: 0,
            creation_pcr_selection: PcrSelection::default(),
            release_pcr_selection: PcrSelection::default(),
            digest_at_creation: [0; DIGEST_SIZE],
            digest_at_release: [0; DIGEST_SIZE],
        }
    }
}

impl TpmStructure for PcrInfoLong {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u16(self.tag);
        buffer.write_u8(self.locality_at_creation);
        buffer.write_u8(self.locality_at_release);
        self.creation_pcr_selection.serialize(buffer)?;
        self.release_pcr_selection.serialize(buffer)?;
        buffer.write_bytes(&self.digest_at_creation);
        buffer.write_bytes(&self.digest_at_release);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.tag = buffer.read_u16()?;
        self.locality_at_creation = buffer.read_u8()?;
        self.locality_at_release = buffer.read_u8()?;
        self.creation_pcr_selection.deserialize(buffer)?;
        self.release_pcr_selection.deserialize(buffer)?;
        read_digest(buffer, &mut self.digest_at_creation)?;
        read_digest(buffer, &mut self.digest_at_release)
    }
}

/// TPM_PCR_INFO_SHORT, returned by Quote2
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PcrInfoShort {
    pub pcr_selection: PcrSelection,
    pub locality_at_release: u8,
    pub digest_at_release: Digest,
}

impl TpmStructure for PcrInfoShort {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        self.pcr_selection.serialize(buffer)?;
        buffer.write_u8(self.locality_at_release);
        buffer.write_bytes(&self.digest_at_release);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.pcr_selection.deserialize(buffer)?;
        self.locality_at_release = buffer.read_u8()?;
        read_digest(buffer, &mut self.digest_at_release)
    }
}

/// TPM_KEY_PARMS
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyParms {
    pub algorithm_id: u32,
    pub enc_scheme: u16,
    pub sig_scheme: u16,
    pub params: Vec<u8>,
}

impl TpmStructure for KeyParms {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.algorithm_id);
        buffer.write_u16(self.enc_scheme);
        buffer.write_u16(self.sig_scheme);
        buffer.write_sized(&self.params)
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.algorithm_id = buffer.read_u32()?;
        self.enc_scheme = buffer.read_u16()?;
        self.sig_scheme = buffer.read_u16()?;
        self.params = buffer.read_sized()?;
        Ok(())
    }
}

/// TPM_RSA_KEY_PARMS, the contents of `KeyParms::params` for RSA keys
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RsaKeyParms {
    pub key_length: u32,
    pub num_primes: u32,
    pub exponent: Vec<u8>,
}

impl TpmStructure for RsaKeyParms {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.key_length);
        buffer.write_u32(self.num_primes);
        buffer.write_sized(&self.exponent)
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.key_length = buffer.read_u32()?;
        self.num_primes = buffer.read_u32()?;
        self.exponent = buffer.read_sized()?;
        Ok(())
    }
}

/// TPM_PUBKEY
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PubKey {
    pub algorithm_params: KeyParms,
    pub key: Vec<u8>,
}

impl TpmStructure for PubKey {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        self.algorithm_params.serialize(buffer)?;
        buffer.write_sized(&self.key)
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.algorithm_params.deserialize(buffer)?;
        self.key = buffer.read_sized()?;
        Ok(())
    }
}

/// Wrapped key blob accepted by LoadKey2
#[derive(Derivative, Default, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct Key {
    pub version: u32,
    pub key_usage: u16,
    pub key_flags: u32,
    pub auth_data_usage: u8,
    pub algorithm_params: KeyParms,
    pub pcr_info: Vec<u8>,
    pub pub_key: Vec<u8>,
    #[derivative(Debug = "ignore")]
    pub enc_data: Vec<u8>,
}

impl TpmStructure for Key {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u32(self.version);
        buffer.write_u16(self.key_usage);
        buffer.write_u32(self.key_flags);
        buffer.write_u8(self.auth_data_usage);
        self.algorithm_params.serialize(buffer)?;
        buffer.write_sized(&self.pcr_info)?;
        buffer.write_sized(&self.pub_key)?;
        buffer.write_sized(&self.enc_data)
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.version = buffer.read_u32()?;
        self.key_usage = buffer.read_u16()?;
        self.key_flags = buffer.read_u32()?;
        self.auth_data_usage = buffer.read_u8()?;
        self.algorithm_params.deserialize(buffer)?;
        self.pcr_info = buffer.read_sized()?;
        self.pub_key = buffer.read_sized()?;
        self.enc_data = buffer.read_sized()?;
        Ok(())
    }
}

/// Fixed prefix of TPM_CAP_VERSION_INFO
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapVersionFixed {
    pub tag: u16,
    pub version: [u8; 4],
    pub spec_level: u16,
    pub errata_rev: u8,
    pub tpm_vendor_id: [u8; 4],
    pub vendor_specific_size: u16,
}

impl CapVersionFixed {
    pub const SIZE: usize = 2 + 4 + 2 + 1 + 4 + 2;
}

impl TpmStructure for CapVersionFixed {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        buffer.write_u16(self.tag);
        buffer.write_bytes(&self.version);
        buffer.write_u16(self.spec_level);
        buffer.write_u8(self.errata_rev);
        buffer.write_bytes(&self.tpm_vendor_id);
        buffer.write_u16(self.vendor_specific_size);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()> {
        self.tag = buffer.read_u16()?;
        buffer.read_into(&mut self.version)?;
        self.spec_level = buffer.read_u16()?;
        self.errata_rev = buffer.read_u8()?;
        buffer.read_into(&mut self.tpm_vendor_id)?;
        self.vendor_specific_size = buffer.read_u16()?;
        Ok(())
    }

    fn fixed_size(&self) -> Option<usize> {
        Some(Self::SIZE)
    }
}

/// TPM_CAP_VERSION_INFO: a fixed prefix and whatever vendor data follows it
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapVersionInfo {
    pub fixed: CapVersionFixed,
    pub vendor_specific: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm_structure::{deserialize, FieldMut};

    #[test]
    fn test_command_header_size_is_backpatched() {
        let payload = [1u8, 2, 3];
        let bytes = CommandHeader::pack(tpm_tag::RQU_COMMAND, tpm_ord::OIAP, &[Field::Array(&payload)]).unwrap();
        assert_eq!(bytes, vec![0x00, 0xC1, 0, 0, 0, 13, 0, 0, 0, 0x0A, 1, 2, 3]);

        let header = CommandHeader::from_bytes(&bytes[..CommandHeader::SIZE]).unwrap();
        assert_eq!(header.size as usize, bytes.len());
    }

    #[test]
    fn test_response_header_truncated() {
        let err = ResponseHeader::unpack(&[0x00, 0xC4, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, TpmError::BufferUnderflow { needed: 10, remaining: 5 }));
    }

    #[test]
    fn test_response_header_ignores_body() {
        let bytes = [0x00, 0xC5, 0, 0, 0, 12, 0, 0, 0, 0, 0xFF, 0xFF];
        let header = ResponseHeader::unpack(&bytes).unwrap();
        assert_eq!(header, ResponseHeader { tag: 0xC5, size: 12, return_code: 0 });
    }

    #[test]
    fn test_auth_block_sizes() {
        assert_eq!(CommandAuth::default().to_bytes().unwrap().len(), CommandAuth::SIZE);
        assert_eq!(ResponseAuth::default().to_bytes().unwrap().len(), ResponseAuth::SIZE);
        assert_eq!(CommandAuth::SIZE, 45);
        assert_eq!(ResponseAuth::SIZE, 41);
    }

    #[test]
    fn test_command_auth_debug_hides_digest() {
        let auth = CommandAuth { auth: [0x5A; DIGEST_SIZE], ..Default::default() };
        let text = format!("{:?}", auth);
        assert!(text.contains("auth_handle"));
        assert!(!text.contains("90, 90"));
    }

    #[test]
    fn test_pcr_info_long_size_depends_on_selection() {
        let mut info = PcrInfoLong::default();
        assert_eq!(info.wire_size().unwrap(), 2 + 1 + 1 + 5 + 5 + 20 + 20);

        info.release_pcr_selection.mask = vec![0xFF; 4];
        assert_eq!(info.wire_size().unwrap(), 2 + 1 + 1 + 5 + 6 + 20 + 20);
    }

    #[test]
    fn test_stored_data_round_trip() {
        let stored = TpmStoredData {
            version: STORED_DATA_VERSION,
            seal_info: vec![1, 2, 3],
            enc_data: b"ciphertext".to_vec(),
        };
        let bytes = stored.to_bytes().unwrap();
        assert_eq!(TpmStoredData::from_bytes(&bytes).unwrap(), stored);
    }

    #[test]
    fn test_pub_key_decode_with_trailing_auth() {
        let pk = PubKey {
            algorithm_params: KeyParms {
                algorithm_id: TPM_ALG_RSA,
                enc_scheme: 1,
                sig_scheme: 2,
                params: RsaKeyParms { key_length: 2048, num_primes: 2, exponent: vec![] }.to_bytes().unwrap(),
            },
            key: vec![0xC3; 256],
        };
        let ra = ResponseAuth { nonce_even: [7; DIGEST_SIZE], continue_auth_session: true, auth: [8; DIGEST_SIZE] };
        let mut body = pk.to_bytes().unwrap();
        body.extend(ra.to_bytes().unwrap());

        let mut pk_out = PubKey::default();
        let mut ra_out = ResponseAuth::default();
        deserialize(&body, &mut [FieldMut::Struct(&mut pk_out), FieldMut::Struct(&mut ra_out)]).unwrap();
        assert_eq!(pk_out, pk);
        assert_eq!(ra_out, ra);
    }

    #[test]
    fn test_auth_count() {
        assert_eq!(tpm_tag::auth_count(tpm_tag::RQU_COMMAND), 0);
        assert_eq!(tpm_tag::auth_count(tpm_tag::RQU_AUTH1_COMMAND), 1);
        assert_eq!(tpm_tag::auth_count(tpm_tag::RQU_AUTH2_COMMAND), 2);
        assert_eq!(tpm_tag::RQU_AUTH2_COMMAND + tpm_tag::RESPONSE_OFFSET, tpm_tag::RSP_AUTH2_COMMAND);
    }
}
