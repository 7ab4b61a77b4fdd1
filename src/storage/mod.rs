use alloc::sync::Arc;
use core::fmt;

mod file;
pub use file::FileStorage;

use crate::AutocopyResult;

pub mod crypto;
pub mod mapper;
mod memory;
mod substorage;

pub use self::{
    mapper::FromStorage,
    memory::VecStorage,
    substorage::{SubStorage, SubStorageError},
};

/// Random access, read-only view of some bytes. Implementors get wrapped in a [`Storage`]
/// handle which is cheap to clone and can be split into bounded views.
pub trait IStorage: fmt::Debug + Send + Sync {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> AutocopyResult<u64>;

    fn length(&self) -> AutocopyResult<u64>;

    fn into_storage(self) -> Storage
    where
        Self: Sized + 'static,
    {
        Storage::new(self)
    }
}

#[derive(Debug, Clone)]
pub struct Storage(Arc<dyn IStorage>);

impl Storage {
    pub fn new(s: impl IStorage + 'static) -> Self {
        Self(Arc::new(s))
    }

    /// Creates a view of `len` bytes starting at `offset`, see [`SubStorage`].
    pub fn split(self, offset: u64, len: u64) -> Result<Storage, SubStorageError> {
        SubStorage::split_from(self, offset, len)
    }

    pub fn map_to_storage<T: FromStorage>(self, args: T::Args) -> T::Output {
        T::from_storage(self, args)
    }

    /// Fills `buf` completely, failing with `UnexpectedEof` if the storage ends early.
    pub fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> AutocopyResult<()> {
        while !buf.is_empty() {
            let cnt = self.read_at(offset, buf)?;
            if cnt == 0 {
                return Err(eof().into());
            }
            offset += cnt;
            buf = &mut buf[cnt as usize..];
        }
        Ok(())
    }

    /// Reads `len` bytes at `offset` into a new buffer. The range is checked against
    /// [`IStorage::length`] before anything is allocated.
    pub fn read_vec_at(&self, offset: u64, len: u64) -> AutocopyResult<Vec<u8>> {
        let storage_len = self.length()?;
        let len = match offset.checked_add(len) {
            Some(end) if end <= storage_len => usize::try_from(len).map_err(|_| eof())?,
            _ => return Err(eof().into()),
        };

        let mut buf = vec![0; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }
}

fn eof() -> std::io::Error {
    std::io::Error::from(std::io::ErrorKind::UnexpectedEof)
}

impl IStorage for Storage {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> AutocopyResult<u64> {
        self.0.read_at(offset, buf)
    }

    fn length(&self) -> AutocopyResult<u64> {
        self.0.length()
    }

    fn into_storage(self) -> Storage {
        self
    }
}
