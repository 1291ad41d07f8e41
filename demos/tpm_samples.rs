/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

use std::error::Error;

use tracing_subscriber::EnvFilter;

use tss_tpm12::{
    auth_session::AuthSession,
    commands::{quote2_out_params, quote2_params, seal_params, unseal_out_params, unseal_params},
    crypto::Crypto,
    device::DeviceConfig,
    tpm::Tpm,
    tpm_structure::{Field, TpmStructure},
    tpm_type_extensions::verify_quote2,
    tpm_types::*,
};

/// Samples against a TPM 1.2 whose owner and SRK use the well-known secret
struct TpmSamples {
    tpm: Tpm<std::fs::File>,
    srk_auth: Digest,
}

impl TpmSamples {
    fn new() -> Result<Self, Box<dyn Error>> {
        let config = DeviceConfig::from_env();
        println!("Connecting to {}...", config.path.display());
        let tpm = Tpm::open(&config)?.with_span(tracing::info_span!("tpm", device = %config.path.display()));
        Ok(Self {
            tpm,
            srk_auth: [0; DIGEST_SIZE],
        })
    }

    fn run_all_samples(&mut self) -> Result<(), Box<dyn Error>> {
        self.announce("Starting TPM 1.2 Samples");

        self.pcr()?;
        self.seal_unseal()?;
        self.attestation()?;

        self.announce("All samples completed successfully");
        Ok(())
    }

    fn announce(&self, title: &str) {
        println!("\n================================================================================");
        println!("        {}", title);
        println!("================================================================================\n");
    }

    fn pcr(&mut self) -> Result<(), Box<dyn Error>> {
        self.announce("PCR Read");
        for index in [0u32, 7, 10] {
            let value = self.tpm.pcr_read(index)?;
            println!("PCR[{:2}] = {}", index, hex::encode(value));
        }
        Ok(())
    }

    fn seal_unseal(&mut self) -> Result<(), Box<dyn Error>> {
        self.announce("Seal / Unseal");
        let secret = b"sealed by tpm_samples";

        let selection = PcrSelection::from_indices(&[0, 7])?;
        let values = [self.tpm.pcr_read(0)?, self.tpm.pcr_read(7)?];
        let pcr_info = PcrInfoLong::for_release(selection, &values, 0x01)?;

        let mut osap = self.tpm.start_osap(tpm_et::SRK, tpm_kh::SRK, &self.srk_auth)?;
        osap.set_continue(false);
        let command = SealCommand {
            key_handle: tpm_kh::SRK,
            enc_auth: osap.encrypt_auth(&self.srk_auth),
        };
        let auth = osap.authorize(tpm_ord::SEAL, &seal_params(&command, Some(&pcr_info), secret))?;
        let (stored, response_auth) = self.tpm.seal(&command, Some(&pcr_info), secret, &auth)?;
        osap.check_response(tpm_ord::SEAL, &[Field::Struct(&stored)], &response_auth)?;
        println!("Sealed {} bytes into a {} byte blob", secret.len(), stored.enc_data.len());

        let mut key_session = self.tpm.start_oiap(&self.srk_auth)?;
        let mut data_session = self.tpm.start_oiap(&self.srk_auth)?;
        key_session.set_continue(false);
        data_session.set_continue(false);

        let key_auth = key_session.authorize(tpm_ord::UNSEAL, &unseal_params(&stored))?;
        let data_auth = data_session.authorize(tpm_ord::UNSEAL, &unseal_params(&stored))?;
        let (plain, key_response, data_response) = self.tpm.unseal(tpm_kh::SRK, &stored, &key_auth, &data_auth)?;
        let out = unseal_out_params(&plain)?;
        key_session.check_response(tpm_ord::UNSEAL, &out, &key_response)?;
        data_session.check_response(tpm_ord::UNSEAL, &out, &data_response)?;

        println!("Unsealed: {}", String::from_utf8_lossy(&plain));
        if plain != secret {
            return Err("unsealed data does not match the sealed secret".into());
        }
        Ok(())
    }

    fn attestation(&mut self) -> Result<(), Box<dyn Error>> {
        self.announce("Quote2");

        let Some(aik_blob) = std::env::var_os("TPM_AIK_BLOB") else {
            println!("TPM_AIK_BLOB not set, skipping");
            return Ok(());
        };
        let key = Key::from_bytes(&std::fs::read(aik_blob)?)?;

        let mut session = self.tpm.start_oiap(&self.srk_auth)?;
        let auth = match session.authorize(tpm_ord::LOAD_KEY2, &[Field::Struct(&key)]) {
            Ok(auth) => auth,
            Err(e) => {
                self.tpm.flush_specific(session.handle, tpm_rt::AUTH)?;
                return Err(e.into());
            }
        };
        let (aik, response_auth) = match self.tpm.load_key2(&key, &auth) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.tpm.flush_specific(session.handle, tpm_rt::AUTH)?;
                return Err(e.into());
            }
        };

        let result = self.quote_with(&mut session, aik, &response_auth);

        // Release the key and session even when the quote failed
        let key_flush = self.tpm.flush_specific(aik, tpm_rt::KEY);
        let session_flush = if session.is_active() {
            self.tpm.flush_specific(session.handle, tpm_rt::AUTH)
        } else {
            Ok(())
        };
        result?;
        key_flush?;
        session_flush?;
        Ok(())
    }

    fn quote_with(
        &mut self,
        session: &mut AuthSession,
        aik: Handle,
        load_response: &ResponseAuth,
    ) -> Result<(), Box<dyn Error>> {
        session.check_response(tpm_ord::LOAD_KEY2, &[], load_response)?;

        let auth = session.authorize(tpm_ord::GET_PUB_KEY, &[])?;
        let (pub_key, response_auth) = self.tpm.get_pub_key(aik, &auth)?;
        session.check_response(tpm_ord::GET_PUB_KEY, &[Field::Struct(&pub_key)], &response_auth)?;

        let nonce = Crypto::random_nonce();
        let selection = PcrSelection::from_indices(&[0, 1, 2, 3, 4, 5, 6, 7])?;
        let auth = session.authorize(tpm_ord::QUOTE2, &quote2_params(&nonce, &selection, true))?;
        let quote = self.tpm.quote2(aik, &nonce, &selection, true, &auth)?;
        session.check_response(tpm_ord::QUOTE2, &quote2_out_params(&quote), &quote.response_auth)?;

        if let Some(cap) = &quote.cap_info {
            println!(
                "TPM vendor {} version {:?}",
                String::from_utf8_lossy(&cap.fixed.tpm_vendor_id),
                cap.fixed.version
            );
        }
        let valid = verify_quote2(&pub_key, &nonce, &quote.pcr_info, &quote.cap_bytes, &quote.sig)?;
        println!("Quote signature valid: {}", valid);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut samples = TpmSamples::new()?;
    samples.run_all_samples()?;

    Ok(())
}
