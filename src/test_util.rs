/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! In-memory devices for unit tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};

use crate::crypto::Crypto;
use crate::error::ReturnCode;
use crate::pcr::composite_digest;
use crate::tpm_buffer::TpmBuffer;
use crate::tpm_structure::{Field, TpmStructure};
use crate::tpm_types::*;

/// Usage secret of every entity the simulator knows
pub(crate) const WELL_KNOWN_SECRET: Digest = [0; DIGEST_SIZE];

/// Raw response bytes with a correct size field
pub(crate) fn response(tag: u16, return_code: u32, body: &[u8]) -> Vec<u8> {
    let mut buffer = TpmBuffer::new();
    buffer.write_u16(tag);
    buffer.write_u32((ResponseHeader::SIZE + body.len()) as u32);
    buffer.write_u32(return_code);
    buffer.write_bytes(body);
    buffer.into_bytes()
}

/// Replays canned responses and records every write
pub(crate) struct ScriptedDevice {
    pub writes: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
    /// Accept at most this many bytes per write
    pub accept_limit: Option<usize>,
}

impl ScriptedDevice {
    pub fn new(responses: Vec<Vec<u8>>) -> Self {
        ScriptedDevice {
            writes: Vec::new(),
            responses: responses.into(),
            accept_limit: None,
        }
    }

    pub fn pending(&self) -> usize {
        self.responses.len()
    }
}

impl Write for ScriptedDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.accept_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.writes.push(buf[..n].to_vec());
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ScriptedDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let next = self
            .responses
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted response"))?;
        let n = next.len().min(buf.len());
        buf[..n].copy_from_slice(&next[..n]);
        Ok(n)
    }
}

struct SimSession {
    nonce_even: Digest,
    secret: Digest,
}

type SimResult<T> = std::result::Result<T, ReturnCode>;

/// A small TPM 1.2 model: sessions with rolling nonces and real HMAC checks,
/// a key table, seal that wraps the plaintext verbatim, and a bounded
/// session table.
pub(crate) struct SimulatedTpm {
    sessions: HashMap<Handle, SimSession>,
    keys: HashSet<Handle>,
    pcrs: Vec<Digest>,
    next_session: Handle,
    next_key: Handle,
    nonce_counter: u32,
    pending: Option<Vec<u8>>,
    pub max_sessions: usize,
    pub ordinals: Vec<u32>,
}

impl SimulatedTpm {
    pub fn new() -> Self {
        SimulatedTpm {
            sessions: HashMap::new(),
            keys: [tpm_kh::SRK].into_iter().collect(),
            pcrs: (0..24u8).map(|i| Crypto::sha1(&[i])).collect(),
            next_session: 0x0200_0000,
            next_key: 0x0100_0000,
            nonce_counter: 0,
            pending: None,
            max_sessions: 3,
            ordinals: Vec::new(),
        }
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_key(&self, handle: Handle) -> bool {
        self.keys.contains(&handle)
    }

    pub fn pcr(&self, index: usize) -> Digest {
        self.pcrs[index]
    }

    fn next_nonce(&mut self) -> Digest {
        self.nonce_counter += 1;
        Crypto::sha1(&self.nonce_counter.to_be_bytes())
    }

    fn new_session(&mut self, secret: Digest) -> SimResult<(Handle, Digest)> {
        if self.sessions.len() >= self.max_sessions {
            return Err(ReturnCode::RESOURCES);
        }
        let handle = self.next_session;
        self.next_session += 1;
        let nonce_even = self.next_nonce();
        self.sessions.insert(handle, SimSession { nonce_even, secret });
        Ok((handle, nonce_even))
    }

    fn execute(&mut self, command: &[u8]) -> Vec<u8> {
        let mut header = CommandHeader::default();
        if header.deserialize(&mut TpmBuffer::from_bytes(command)).is_err() {
            return response(tpm_tag::RSP_COMMAND, ReturnCode::BAD_PARAMETER.0, &[]);
        }
        self.ordinals.push(header.ordinal);
        let rsp_tag = header.tag + tpm_tag::RESPONSE_OFFSET;
        match self.dispatch(header.tag, header.ordinal, &command[CommandHeader::SIZE..]) {
            Ok(body) => response(rsp_tag, 0, &body),
            Err(rc) => response(rsp_tag, rc.0, &[]),
        }
    }

    fn dispatch(&mut self, tag: u16, ordinal: u32, payload: &[u8]) -> SimResult<Vec<u8>> {
        let expected_auths = match ordinal {
            tpm_ord::OIAP | tpm_ord::OSAP | tpm_ord::FLUSH_SPECIFIC | tpm_ord::PCR_READ => 0,
            tpm_ord::SEAL | tpm_ord::LOAD_KEY2 | tpm_ord::GET_PUB_KEY | tpm_ord::QUOTE2 => 1,
            tpm_ord::UNSEAL => 2,
            _ => return Err(ReturnCode::BAD_ORDINAL),
        };
        if tpm_tag::auth_count(tag) != expected_auths {
            return Err(ReturnCode::BADTAG);
        }

        let bad = |_| ReturnCode::BAD_PARAMETER;
        if expected_auths == 0 {
            let mut buffer = TpmBuffer::from_bytes(payload);
            return match ordinal {
                tpm_ord::OIAP => {
                    let (auth_handle, nonce_even) = self.new_session(WELL_KNOWN_SECRET)?;
                    OiapResponse { auth_handle, nonce_even }.to_bytes().map_err(bad)
                }
                tpm_ord::OSAP => {
                    let mut cmd = OsapCommand::default();
                    cmd.deserialize(&mut buffer).map_err(bad)?;
                    let nonce_even_osap = self.next_nonce();
                    let mut seed = nonce_even_osap.to_vec();
                    seed.extend_from_slice(&cmd.nonce_odd_osap);
                    let secret = Crypto::hmac_sha1(&WELL_KNOWN_SECRET, &seed).map_err(bad)?;
                    let (auth_handle, nonce_even) = self.new_session(secret)?;
                    OsapResponse { auth_handle, nonce_even, nonce_even_osap }.to_bytes().map_err(bad)
                }
                tpm_ord::FLUSH_SPECIFIC => {
                    let handle = buffer.read_u32().map_err(bad)?;
                    match buffer.read_u32().map_err(bad)? {
                        tpm_rt::AUTH => self.sessions.remove(&handle).map(|_| Vec::new()).ok_or(ReturnCode::INVALID_AUTHHANDLE),
                        tpm_rt::KEY => {
                            if self.keys.remove(&handle) {
                                Ok(Vec::new())
                            } else {
                                Err(ReturnCode::INVALID_KEYHANDLE)
                            }
                        }
                        _ => Err(ReturnCode::INVALID_RESOURCE),
                    }
                }
                _ => {
                    let index = buffer.read_u32().map_err(bad)? as usize;
                    self.pcrs.get(index).map(|d| d.to_vec()).ok_or(ReturnCode::BADINDEX)
                }
            };
        }

        let auth_len = expected_auths * CommandAuth::SIZE;
        if payload.len() < 4 + auth_len {
            return Err(ReturnCode::BAD_PARAMETER);
        }
        let (head, auth_bytes) = payload.split_at(payload.len() - auth_len);
        let mut auths = Vec::new();
        let mut buffer = TpmBuffer::from_bytes(auth_bytes);
        for _ in 0..expected_auths {
            let mut ca = CommandAuth::default();
            ca.deserialize(&mut buffer).map_err(bad)?;
            auths.push(ca);
        }

        let key_handle = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        let params = &head[4..];
        if !self.keys.contains(&key_handle) {
            return Err(ReturnCode::INVALID_KEYHANDLE);
        }

        let in_digest = Crypto::in_param_digest(ordinal, &[Field::Array(params)]).map_err(bad)?;
        for (i, ca) in auths.iter().enumerate() {
            let session = self.sessions.get(&ca.auth_handle).ok_or(ReturnCode::INVALID_AUTHHANDLE)?;
            let expected = Crypto::auth_digest(
                &session.secret,
                &in_digest,
                &session.nonce_even,
                &ca.nonce_odd,
                ca.continue_auth_session,
            )
            .map_err(bad)?;
            if expected != ca.auth {
                return Err(if i == 0 { ReturnCode::AUTHFAIL } else { ReturnCode::AUTH2FAIL });
            }
        }

        let (out_handles, out_params) = self.run_authorized(ordinal, params)?;

        let out_digest = Crypto::out_param_digest(0, ordinal, &[Field::Array(&out_params)]).map_err(bad)?;
        let mut body = out_handles;
        body.extend_from_slice(&out_params);
        for ca in &auths {
            let nonce_even = self.next_nonce();
            let secret = self.sessions[&ca.auth_handle].secret;
            let auth = Crypto::auth_digest(&secret, &out_digest, &nonce_even, &ca.nonce_odd, ca.continue_auth_session)
                .map_err(bad)?;
            if ca.continue_auth_session {
                if let Some(session) = self.sessions.get_mut(&ca.auth_handle) {
                    session.nonce_even = nonce_even;
                }
            } else {
                self.sessions.remove(&ca.auth_handle);
            }
            let ra = ResponseAuth {
                nonce_even,
                continue_auth_session: ca.continue_auth_session,
                auth,
            };
            body.extend(ra.to_bytes().map_err(bad)?);
        }
        Ok(body)
    }

    fn run_authorized(&mut self, ordinal: u32, params: &[u8]) -> SimResult<(Vec<u8>, Vec<u8>)> {
        let bad = |_| ReturnCode::BAD_PARAMETER;
        let mut buffer = TpmBuffer::from_bytes(params);
        match ordinal {
            tpm_ord::SEAL => {
                let mut enc_auth = [0u8; DIGEST_SIZE];
                buffer.read_into(&mut enc_auth).map_err(bad)?;
                let seal_info = buffer.read_sized().map_err(bad)?;
                let enc_data = buffer.read_sized().map_err(bad)?;
                let stored = TpmStoredData {
                    version: STORED_DATA_VERSION,
                    seal_info,
                    enc_data,
                };
                Ok((Vec::new(), stored.to_bytes().map_err(bad)?))
            }
            tpm_ord::UNSEAL => {
                let mut stored = TpmStoredData::default();
                stored.deserialize(&mut buffer).map_err(bad)?;
                if stored.version != STORED_DATA_VERSION {
                    return Err(ReturnCode(0x13));
                }
                let mut out = TpmBuffer::new();
                out.write_sized(&stored.enc_data).map_err(bad)?;
                Ok((Vec::new(), out.into_bytes()))
            }
            tpm_ord::LOAD_KEY2 => {
                let mut key = Key::default();
                key.deserialize(&mut buffer).map_err(bad)?;
                let handle = self.next_key;
                self.next_key += 1;
                self.keys.insert(handle);
                Ok((handle.to_be_bytes().to_vec(), Vec::new()))
            }
            tpm_ord::GET_PUB_KEY => Ok((Vec::new(), sample_pub_key().to_bytes().map_err(bad)?)),
            _ => {
                let mut external_data = [0u8; DIGEST_SIZE];
                buffer.read_into(&mut external_data).map_err(bad)?;
                let mut selection = PcrSelection::default();
                selection.deserialize(&mut buffer).map_err(bad)?;
                let add_version = buffer.read_u8().map_err(bad)? != 0;

                let values: Vec<Digest> = selection.indices().into_iter().map(|i| self.pcrs[i as usize]).collect();
                let info = PcrInfoShort {
                    digest_at_release: composite_digest(&selection, &values).map_err(bad)?,
                    pcr_selection: selection,
                    locality_at_release: 1,
                };
                let mut out = TpmBuffer::new();
                info.serialize(&mut out).map_err(bad)?;
                let cap = if add_version { sample_cap_version() } else { Vec::new() };
                out.write_sized(&cap).map_err(bad)?;
                out.write_sized(&[0x5A; 256]).map_err(bad)?;
                Ok((Vec::new(), out.into_bytes()))
            }
        }
    }
}

pub(crate) const SAMPLE_VENDOR_DATA: [u8; 3] = [0xAA, 0xBB, 0xCC];

pub(crate) fn sample_cap_version() -> Vec<u8> {
    let fixed = CapVersionFixed {
        tag: tpm_tag::CAP_VERSION_INFO,
        version: [1, 2, 3, 0],
        spec_level: 2,
        errata_rev: 3,
        tpm_vendor_id: *b"SIM ",
        vendor_specific_size: SAMPLE_VENDOR_DATA.len() as u16,
    };
    let mut bytes = fixed.to_bytes().unwrap_or_default();
    bytes.extend_from_slice(&SAMPLE_VENDOR_DATA);
    bytes
}

pub(crate) fn sample_pub_key() -> PubKey {
    let params = RsaKeyParms {
        key_length: 2048,
        num_primes: 2,
        exponent: Vec::new(),
    };
    PubKey {
        algorithm_params: KeyParms {
            algorithm_id: TPM_ALG_RSA,
            enc_scheme: 0x0001,
            sig_scheme: 0x0002,
            params: params.to_bytes().unwrap_or_default(),
        },
        key: vec![0xC3; 256],
    }
}

impl Write for SimulatedTpm {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending = Some(self.execute(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedTpm {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let next = self
            .pending
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no command pending"))?;
        let n = next.len().min(buf.len());
        buf[..n].copy_from_slice(&next[..n]);
        Ok(n)
    }
}
