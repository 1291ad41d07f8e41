/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! OIAP / OSAP authorization sessions

use std::io::{Read, Write};

use derivative::Derivative;

use crate::crypto::Crypto;
use crate::error::{Result, TpmError};
use crate::tpm::Tpm;
use crate::tpm_structure::{Field, FieldMut};
use crate::tpm_types::*;

/// How the session secret was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Object-independent; the secret is the usage auth of whatever is authorized
    Oiap,
    /// Bound to one entity; the secret is derived during the handshake
    Osap { entity_type: u16, entity_value: u32 },
}

/// Authorization session for TPM commands
///
/// Every exchange rolls the nonces: the caller sends a fresh `nonce_odd`,
/// the TPM answers with a fresh `nonce_even`. A session must be rolled from
/// the latest response before it is used again.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct AuthSession {
    pub handle: Handle,
    pub nonce_even: Digest,
    pub nonce_odd: Digest,
    pub continue_auth_session: bool,
    pub kind: SessionKind,
    #[derivative(Debug = "ignore")]
    secret: Digest,
    terminated: bool,
}

impl AuthSession {
    pub fn from_oiap(response: &OiapResponse, usage_auth: &Digest) -> Self {
        AuthSession {
            handle: response.auth_handle,
            nonce_even: response.nonce_even,
            nonce_odd: [0; DIGEST_SIZE],
            continue_auth_session: true,
            kind: SessionKind::Oiap,
            secret: *usage_auth,
            terminated: false,
        }
    }

    /// Derive the shared secret `HMAC(entity_auth, nonceEvenOSAP || nonceOddOSAP)`
    pub fn from_osap(command: &OsapCommand, response: &OsapResponse, entity_auth: &Digest) -> Result<Self> {
        let mut seed = response.nonce_even_osap.to_vec();
        seed.extend_from_slice(&command.nonce_odd_osap);
        let shared_secret = Crypto::hmac_sha1(entity_auth, &seed)?;

        Ok(AuthSession {
            handle: response.auth_handle,
            nonce_even: response.nonce_even,
            nonce_odd: [0; DIGEST_SIZE],
            continue_auth_session: true,
            kind: SessionKind::Osap {
                entity_type: command.entity_type,
                entity_value: command.entity_value,
            },
            secret: shared_secret,
            terminated: false,
        })
    }

    /// False once a response closed the session
    pub fn is_active(&self) -> bool {
        !self.terminated
    }

    /// Ask the TPM to keep (true) or close (false) the session after the next command
    pub fn set_continue(&mut self, keep: bool) {
        self.continue_auth_session = keep;
    }

    /// ADIP encryption of a new usage secret, as Seal expects in `enc_auth`.
    /// Only meaningful for OSAP sessions.
    pub fn encrypt_auth(&self, new_auth: &Digest) -> Digest {
        let mut seed = self.secret.to_vec();
        seed.extend_from_slice(&self.nonce_even);
        let pad = Crypto::sha1(&seed);
        let mut out = [0u8; DIGEST_SIZE];
        for (o, (a, p)) in out.iter_mut().zip(new_auth.iter().zip(pad.iter())) {
            *o = a ^ p;
        }
        out
    }

    /// Authorization block for the next command, with a fresh caller nonce.
    /// `params` are the command parameters without handles or auth blocks.
    pub fn authorize(&mut self, ordinal: u32, params: &[Field]) -> Result<CommandAuth> {
        self.authorize_with_nonce(ordinal, params, Crypto::random_nonce())
    }

    pub fn authorize_with_nonce(&mut self, ordinal: u32, params: &[Field], nonce_odd: Digest) -> Result<CommandAuth> {
        if self.terminated {
            return Err(TpmError::SessionTerminated(self.handle));
        }
        self.nonce_odd = nonce_odd;

        let param_digest = Crypto::in_param_digest(ordinal, params)?;
        let auth = Crypto::auth_digest(
            &self.secret,
            &param_digest,
            &self.nonce_even,
            &self.nonce_odd,
            self.continue_auth_session,
        )?;

        Ok(CommandAuth {
            auth_handle: self.handle,
            nonce_odd: self.nonce_odd,
            continue_auth_session: self.continue_auth_session,
            auth,
        })
    }

    /// Take the TPM's new nonce without checking the response HMAC
    pub fn roll(&mut self, response: &ResponseAuth) {
        self.nonce_even = response.nonce_even;
        if !response.continue_auth_session {
            self.terminated = true;
        }
    }

    /// Verify the response HMAC over `out_params`, then roll the nonce
    pub fn check_response(&mut self, ordinal: u32, out_params: &[Field], response: &ResponseAuth) -> Result<()> {
        let param_digest = Crypto::out_param_digest(0, ordinal, out_params)?;
        let expected = Crypto::auth_digest(
            &self.secret,
            &param_digest,
            &response.nonce_even,
            &self.nonce_odd,
            response.continue_auth_session,
        )?;
        if expected != response.auth {
            return Err(TpmError::ResponseAuthMismatch);
        }
        self.roll(response);
        Ok(())
    }
}

impl<D: Read + Write> Tpm<D> {
    /// Object-independent authorization protocol handshake
    pub fn oiap(&mut self) -> Result<OiapResponse> {
        let mut response = OiapResponse::default();
        self.submit(
            tpm_tag::RQU_COMMAND,
            tpm_ord::OIAP,
            &[],
            &mut [FieldMut::Struct(&mut response)],
        )?;
        Ok(response)
    }

    /// Object-specific authorization protocol handshake
    pub fn osap(&mut self, command: &OsapCommand) -> Result<OsapResponse> {
        let mut response = OsapResponse::default();
        self.submit(
            tpm_tag::RQU_COMMAND,
            tpm_ord::OSAP,
            &[Field::Struct(command)],
            &mut [FieldMut::Struct(&mut response)],
        )?;
        Ok(response)
    }

    /// Open an OIAP session authorizing with `usage_auth`
    pub fn start_oiap(&mut self, usage_auth: &Digest) -> Result<AuthSession> {
        let response = self.oiap()?;
        tracing::debug!("opened OIAP session 0x{:08X}", response.auth_handle);
        Ok(AuthSession::from_oiap(&response, usage_auth))
    }

    /// Open an OSAP session bound to one entity
    pub fn start_osap(&mut self, entity_type: u16, entity_value: u32, entity_auth: &Digest) -> Result<AuthSession> {
        let command = OsapCommand {
            entity_type,
            entity_value,
            nonce_odd_osap: Crypto::random_nonce(),
        };
        let response = self.osap(&command)?;
        tracing::debug!(
            "opened OSAP session 0x{:08X} for entity 0x{:08X}",
            response.auth_handle,
            entity_value
        );
        AuthSession::from_osap(&command, &response, entity_auth)
    }
}
