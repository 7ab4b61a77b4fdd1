//! Opening storage images as decrypted volumes.

use std::path::Path;

use crate::{
    storage::{crypto::AesCtrStorage, FileStorage, Storage},
    AutocopyResult,
};

/// Turns an image on disk into a decrypted, byte addressable volume. One opener is shared
/// by every image of a batch.
pub trait ImageOpener {
    fn open_image(&self, path: &Path) -> AutocopyResult<Storage>;
}

/// Images that are already decrypted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawImage;

impl ImageOpener for RawImage {
    fn open_image(&self, path: &Path) -> AutocopyResult<Storage> {
        Ok(FileStorage::open(path)?)
    }
}

/// Images encrypted with AES-128-CTR under a known key, `ctr` being the counter for the
/// first byte of the image.
#[derive(Clone)]
pub struct AesCtrImage {
    key: [u8; 0x10],
    ctr: [u8; 0x10],
}

impl AesCtrImage {
    pub fn new(key: [u8; 0x10], ctr: [u8; 0x10]) -> Self {
        Self { key, ctr }
    }
}

impl core::fmt::Debug for AesCtrImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesCtrImage").finish_non_exhaustive()
    }
}

impl ImageOpener for AesCtrImage {
    fn open_image(&self, path: &Path) -> AutocopyResult<Storage> {
        Ok(AesCtrStorage::new(FileStorage::open(path)?, self.key, self.ctr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::IStorage;
    use aes::{
        cipher::{KeyIvInit, StreamCipher},
        Aes128,
    };
    use std::io::Write;

    #[test]
    fn aes_ctr_image_decrypts_files() -> AutocopyResult<()> {
        let key: [u8; 0x10] = [0x11; 0x10];
        let iv: [u8; 0x10] = [0x22; 0x10];
        let plain = b"a decrypted volume, byte for byte".to_vec();

        let mut enc = plain.clone();
        ctr::Ctr128BE::<Aes128>::new(&key.into(), &iv.into()).apply_keystream(&mut enc);

        let mut fp = tempfile::NamedTempFile::new()?;
        fp.write_all(&enc)?;

        let volume = AesCtrImage::new(key, iv).open_image(fp.path())?;
        assert_eq!(volume.read_vec_at(0, plain.len() as u64)?, plain);

        let raw = RawImage.open_image(fp.path())?;
        assert_eq!(raw.length()?, enc.len() as u64);

        Ok(())
    }

    #[test]
    fn missing_images_are_io_errors() {
        assert!(matches!(
            RawImage.open_image(Path::new("/nonexistent/nand.bin")),
            Err(crate::AutocopyError::IoError(_))
        ));
    }
}
