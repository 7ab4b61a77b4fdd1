use super::{IStorage, Storage};
use crate::AutocopyResult;

#[derive(Debug, PartialEq, thiserror_no_std::Error)]
pub enum SubStorageError {
    #[error("attempted to create a too large substorage. parent is {parent_len} large, substorage is {len} bytes at offset {offset}")]
    OutOfBounds {
        parent_len: u64,
        offset: u64,
        len: u64,
    },

    #[error("parent storage needs to declare a length")]
    FailedToGetParentStorageLength,
}

pub type SubStorageResult<T> = core::result::Result<T, SubStorageError>;

/// A partial view into an existing [`Storage`]. Useful for logically splitting storages when
/// dealing with containers where a new section logically is a new file with offsets relative to its start.
///
/// ```
/// use autocopy::prelude::*;
///
/// fn main() -> AutocopyResult<()> {
///     let memory = VecStorage::new([0, 1, 2, 3, 4, 5, 6, 7]);
///     let first_half = memory.clone().split(0, 4)?;
///     let second_half = memory.clone().split(4, 4)?;
///
///     let mut buf = [0; 4];
///     first_half.read_at(0, &mut buf)?;
///     assert_eq!(buf, [0, 1, 2, 3]);
///
///     second_half.read_at(0, &mut buf)?;
///     assert_eq!(buf, [4, 5, 6, 7]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SubStorage {
    parent: Storage,
    offset: u64,
    len: u64,
}

impl SubStorage {
    pub(crate) fn split_from(parent: Storage, offset: u64, len: u64) -> SubStorageResult<Storage> {
        let parent_len = parent
            .length()
            .map_err(|_| SubStorageError::FailedToGetParentStorageLength)?;

        match offset.checked_add(len) {
            Some(end) if end <= parent_len => {}
            _ => {
                return Err(SubStorageError::OutOfBounds {
                    parent_len,
                    offset,
                    len,
                })
            }
        }

        Ok(Self {
            parent,
            offset,
            len,
        }
        .into_storage())
    }
}

impl IStorage for SubStorage {
    fn read_at(&self, offset: u64, mut buf: &mut [u8]) -> AutocopyResult<u64> {
        use core::cmp::min;

        let available_len = self.len.saturating_sub(offset);
        let buf_len = min(available_len, buf.len() as u64) as usize;
        buf = &mut buf[..buf_len];

        if buf.is_empty() {
            return Ok(0);
        }

        self.parent.read_at(self.offset + offset, buf)
    }

    fn length(&self) -> AutocopyResult<u64> {
        Ok(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::SubStorageError;
    use crate::{prelude::*, AutocopyResult};

    #[test]
    fn reads_are_bounded_to_the_window() -> AutocopyResult<()> {
        let sub = VecStorage::new(vec![0, 1, 2, 3, 4, 5, 6, 7]).split(2, 3)?;

        let mut buf = [0xff; 8];
        assert_eq!(sub.read_at(0, &mut buf)?, 3);
        assert_eq!(&buf[..3], [2, 3, 4]);

        assert_eq!(sub.read_at(2, &mut buf)?, 1);
        assert_eq!(buf[0], 4);

        assert_eq!(sub.read_at(3, &mut buf)?, 0);

        Ok(())
    }

    #[test]
    fn rejects_windows_past_the_parent() {
        let memory = VecStorage::new(vec![0; 8]);

        assert_eq!(
            memory.clone().split(4, 5).unwrap_err(),
            SubStorageError::OutOfBounds {
                parent_len: 8,
                offset: 4,
                len: 5
            }
        );
        assert!(memory.split(u64::MAX, 2).is_err());
    }
}
