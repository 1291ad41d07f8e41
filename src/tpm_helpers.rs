/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Bit set on return codes that report a transient condition
pub const TPM_NON_FATAL: u32 = 0x0000_0800;

lazy_static! {
    static ref RC_TO_STR_MAP: HashMap<u32, &'static str> = {
        let mut m = HashMap::new();
        m.insert(0x00, "success");
        m.insert(0x01, "authentication failed");
        m.insert(0x02, "the index to a PCR, DIR or other register is incorrect");
        m.insert(0x03, "one or more parameter is bad");
        m.insert(0x04, "an operation completed successfully but the auditing of that operation failed");
        m.insert(0x05, "the clear disable flag is set and all clear operations now require physical access");
        m.insert(0x06, "the TPM is deactivated");
        m.insert(0x07, "the TPM is disabled");
        m.insert(0x08, "the target command has been disabled");
        m.insert(0x09, "the operation failed");
        m.insert(0x0A, "the ordinal was unknown or inconsistent");
        m.insert(0x0B, "the ability to install an owner is disabled");
        m.insert(0x0C, "the key handle can not be interpreted");
        m.insert(0x0D, "the key handle points to an invalid key");
        m.insert(0x0E, "unacceptable encryption scheme");
        m.insert(0x0F, "migration authorization failed");
        m.insert(0x10, "PCR information could not be interpreted");
        m.insert(0x11, "no room to load key");
        m.insert(0x12, "there is no SRK set");
        m.insert(0x13, "an encrypted blob is invalid or was not created by this TPM");
        m.insert(0x14, "there is already an owner");
        m.insert(0x15, "the TPM has insufficient internal resources to perform the requested action");
        m.insert(0x16, "a random string was too short");
        m.insert(0x17, "the TPM does not have the space to perform the operation");
        m.insert(0x18, "the named PCR value does not match the current PCR value");
        m.insert(0x19, "the paramSize argument to the command has the incorrect value");
        m.insert(0x1A, "there is no existing SHA-1 thread");
        m.insert(0x1B, "the calculation is unable to proceed because the existing SHA-1 thread has already encountered an error");
        m.insert(0x1C, "self-test has failed and the TPM has shut down");
        m.insert(0x1D, "the authorization for the second key in a 2 key function failed authorization");
        m.insert(0x1E, "the tag value sent to for a command is invalid");
        m.insert(0x1F, "an IO error occurred transmitting information to the TPM");
        m.insert(0x20, "the encryption process had a problem");
        m.insert(0x21, "the decryption process did not complete");
        m.insert(0x22, "an invalid handle was used");
        m.insert(0x23, "the TPM does not have an endorsement key installed");
        m.insert(0x24, "the usage of a key is not allowed");
        m.insert(0x25, "the submitted entity type is not allowed");
        m.insert(0x26, "the command was received in the wrong sequence relative to TPM_Init and a subsequent TPM_Startup");
        m.insert(0x27, "signed data cannot include additional DER information");
        m.insert(0x28, "the key properties in TPM_KEY_PARMs are not supported by this TPM");
        m.insert(0x29, "the migration properties of this key are incorrect");
        m.insert(0x2A, "the signature or encryption scheme for this key is incorrect or not permitted in this situation");
        m.insert(0x2B, "the size of the data parameter is bad or inconsistent with the referenced key");
        m.insert(0x2C, "a mode parameter is bad");
        m.insert(0x2D, "either the physicalPresence or physicalPresenceLock bits have the wrong value");
        m.insert(0x2E, "the TPM cannot perform this version of the capability");
        m.insert(0x2F, "the TPM does not allow for wrapped transport sessions");
        m.insert(0x33, "the command must be executed at a locality that the PCR allows to be reset");
        m.insert(0x34, "the command requires the type of a resource that was not supplied");
        m.insert(0x35, "the resource pointed to by the context is not loaded");
        m.insert(0x3D, "the locality is incorrect for the attempted operation");
        m.insert(0x43, "the structure tag and version are invalid or inconsistent");
        m.insert(0x47, "the gap between saved context counts is too large");
        m.insert(0x4A, "a required resource is missing");
        m.insert(TPM_NON_FATAL, "the TPM is too busy to respond to the command immediately, but the command could be resubmitted at a later time");
        m
    };
}

/// Resolve a numeric TPM return code to its description
pub fn rc_to_str(code: u32) -> &'static str {
    RC_TO_STR_MAP.get(&code).copied().unwrap_or("unknown TPM error")
}

/// True if the code reports a transient condition the caller may retry
pub fn is_non_fatal(code: u32) -> bool {
    code & TPM_NON_FATAL != 0
}
