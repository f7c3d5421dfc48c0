// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content fingerprint over a Dockerfile and its source files

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

crate::define_id! {
    /// `build-` followed by the first 12 hex digits of the content hash.
    pub struct BuildFingerprint;
}

/// Prefix on every fingerprint.
pub const FINGERPRINT_PREFIX: &str = "build-";

const HEX_DIGITS: usize = 12;

impl BuildFingerprint {
    /// Hash the Dockerfile followed by each file's path and content in path order.
    ///
    /// Lengths are mixed in so that moving bytes between a path and its
    /// content changes the result.
    pub fn compute(dockerfile: &str, files: &BTreeMap<String, String>) -> Self {
        let mut hasher = Sha256::new();
        hash_field(&mut hasher, dockerfile.as_bytes());
        for (path, content) in files {
            hash_field(&mut hasher, path.as_bytes());
            hash_field(&mut hasher, content.as_bytes());
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self::new(format!("{FINGERPRINT_PREFIX}{}", &hex[..HEX_DIGITS]))
    }
}

fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
