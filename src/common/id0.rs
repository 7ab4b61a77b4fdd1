use core::{fmt, str::FromStr};
use sha2::{Digest, Sha256};

use crate::{AutocopyError, AutocopyResult};

/// The 16 bytes of console-unique key material the id0 is derived from.
pub type KeyY = [u8; 0x10];

/// Per-console directory name below `/data`, 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id0([u8; 0x10]);

impl Id0 {
    /// Derives the id0 from key material: SHA-256 the key, keep the first 16 bytes
    /// and byte-swap every 32 bit word.
    pub fn derive(key_y: &KeyY) -> Self {
        Self(swap_words(&Sha256::digest(key_y)))
    }
}

fn swap_words(hash: &[u8]) -> [u8; 0x10] {
    let mut out = [0; 0x10];
    for (out, word) in out.chunks_exact_mut(4).zip(hash.chunks_exact(4)) {
        out.copy_from_slice(word);
        out.reverse();
    }
    out
}

impl FromStr for Id0 {
    type Err = AutocopyError;

    fn from_str(s: &str) -> AutocopyResult<Self> {
        crate::utils::hex_str_to_array(s)
            .map(Self)
            .map_err(|_| AutocopyError::InvalidId0(s.into()))
    }
}

impl fmt::Debug for Id0 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id0({self})")
    }
}

impl fmt::Display for Id0 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
