/// Identifier types shared by the mapper, index and stores.

use std::fmt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Modulus for stable keys: keeps them positive in a signed 64-bit column.
const STABLE_KEY_MODULUS: u128 = (1u128 << 63) - 1;

/// Pipeline-stable document identifier.
///
/// Never reused for a different document. Record ids coming straight out of
/// WARC headers (`<urn:uuid:...>`) are stripped to the bare uuid so the same
/// article maps to the same id whichever stage produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        match id
            .strip_prefix("<urn:uuid:")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            Some(bare) => ExternalId(bare.to_string()),
            None => ExternalId(id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 63-bit key derived from SHA-256 of the id.
    ///
    /// The full digest is read as a big-endian integer and reduced modulo
    /// `2^63 - 1`, which matches keys produced by external ANN tooling fed
    /// from the same corpus.
    pub fn stable_key(&self) -> u64 {
        let digest = Sha256::digest(self.0.as_bytes());
        // Horner over 8-byte limbs: acc < 2^63, so acc << 64 fits in u128.
        let mut acc: u128 = 0;
        for chunk in digest.chunks(8) {
            let mut limb = [0u8; 8];
            limb.copy_from_slice(chunk);
            let limb = u64::from_be_bytes(limb) as u128;
            acc = ((acc << 64) | limb) % STABLE_KEY_MODULUS;
        }
        acc as u64
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        ExternalId::new(s)
    }
}

impl From<String> for ExternalId {
    fn from(s: String) -> Self {
        ExternalId::new(s)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

/// Dense slot number inside the vector index. Valid for one generation only.
pub type InternalPosition = u64;

/// Corpus generation counter, bumped by compaction and recode.
pub type Generation = u64;
