use crate::{prelude::*, AutocopyResult};
use aes::{
    cipher::{KeyIvInit, StreamCipher, StreamCipherSeek},
    Aes128,
};
use ctr::Ctr128BE;
use parking_lot::Mutex;

use core::fmt;

/// Transparent AES-128-CTR decryption of a parent storage. The counter is a 128 bit
/// big endian value incremented once per 16 byte block, starting at `ctr` for offset 0.
pub struct AesCtrStorage {
    parent: Storage,
    aes_ctx: Mutex<Ctr128BE<Aes128>>,
}

impl AesCtrStorage {
    pub fn new(parent: Storage, key: [u8; 0x10], ctr: [u8; 0x10]) -> Storage {
        Self {
            parent,
            aes_ctx: Mutex::new(Ctr128BE::<Aes128>::new(&key.into(), &ctr.into())),
        }
        .into_storage()
    }
}

impl fmt::Debug for AesCtrStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesCtrStorage")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl IStorage for AesCtrStorage {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> AutocopyResult<u64> {
        let len = self.parent.read_at(offset, buf)?;

        let mut aes = self.aes_ctx.lock();
        aes.seek(offset);
        aes.apply_keystream(&mut buf[..len as usize]);

        Ok(len)
    }

    fn length(&self) -> AutocopyResult<u64> {
        self.parent.length()
    }
}
