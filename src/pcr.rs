/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! PCR selection masks and composite digests

use crate::crypto::Crypto;
use crate::error::{Result, TpmError};
use crate::tpm_buffer::TpmBuffer;
use crate::tpm_structure::TpmStructure;
use crate::tpm_types::{tpm_tag, Digest, PcrInfoLong, PcrSelection, DIGEST_SIZE};

impl PcrSelection {
    /// Selection with the given PCR indices set
    pub fn from_indices(indices: &[u32]) -> Result<Self> {
        let mut selection = PcrSelection::default();
        for &index in indices {
            let byte = (index / 8) as usize;
            if byte >= selection.mask.len() {
                return Err(TpmError::BufferOverflow(format!(
                    "PCR {} outside a {}-byte selection",
                    index,
                    selection.mask.len()
                )));
            }
            selection.mask[byte] |= 1 << (index % 8);
        }
        Ok(selection)
    }

    pub fn is_selected(&self, index: u32) -> bool {
        self.mask
            .get((index / 8) as usize)
            .is_some_and(|b| b & (1 << (index % 8)) != 0)
    }

    /// Selected indices in ascending order
    pub fn indices(&self) -> Vec<u32> {
        (0..(self.mask.len() * 8) as u32).filter(|&i| self.is_selected(i)).collect()
    }
}

/// SHA-1 of the TPM_PCR_COMPOSITE for `selection` and the matching PCR
/// values, one per selected index in ascending order.
pub fn composite_digest(selection: &PcrSelection, values: &[Digest]) -> Result<Digest> {
    let selected = selection.indices().len();
    if selected != values.len() {
        return Err(TpmError::InvalidLayout(format!(
            "{} PCRs selected but {} values supplied",
            selected,
            values.len()
        )));
    }

    let mut buffer = TpmBuffer::new();
    selection.serialize(&mut buffer)?;
    buffer.write_u32((values.len() * DIGEST_SIZE) as u32);
    for value in values {
        buffer.write_bytes(value);
    }
    Ok(Crypto::sha1(buffer.as_bytes()))
}

impl PcrInfoLong {
    /// Binding that releases only when the selected PCRs hold `values`
    pub fn for_release(selection: PcrSelection, values: &[Digest], locality_at_release: u8) -> Result<Self> {
        let digest = composite_digest(&selection, values)?;
        Ok(PcrInfoLong {
            tag: tpm_tag::PCR_INFO_LONG,
            locality_at_creation: locality_at_release,
            locality_at_release,
            creation_pcr_selection: selection.clone(),
            release_pcr_selection: selection,
            digest_at_creation: digest,
            digest_at_release: digest,
        })
    }
}
